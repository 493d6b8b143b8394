use bytes::Bytes;

use crate::{InboundPipe, ReadOutcome};

#[test]
fn drains_in_short_reads() {
    let mut pipe = InboundPipe::new();
    pipe.receive(Bytes::from_static(&[1, 2, 3, 4, 5]));

    for expected in 1..=5u8 {
        let mut dst = [0u8; 1];
        assert_eq!(pipe.read(&mut dst), ReadOutcome::Read(1));
        assert_eq!(dst[0], expected);
    }

    let mut dst = [0u8; 1];
    assert_eq!(pipe.read(&mut dst), ReadOutcome::WouldBlock);
}

/// Any partition of read sizes reconstructs the original bytes in order.
#[test]
fn arbitrary_read_partition_reconstructs_input() {
    let input: Vec<u8> = (0..37u8).collect();
    let mut pipe = InboundPipe::new();
    pipe.receive(Bytes::from(input.clone()));

    let mut out = Vec::new();
    for chunk_len in [3, 1, 10, 4, 1, 18] {
        let mut dst = vec![0u8; chunk_len];
        match pipe.read(&mut dst) {
            ReadOutcome::Read(n) => out.extend_from_slice(&dst[..n]),
            ReadOutcome::WouldBlock => break,
        }
    }

    assert_eq!(out, input);
}

/// Reading with nothing injected would-blocks.
#[test]
fn read_with_no_pending_buffer_would_block() {
    let mut pipe = InboundPipe::new();
    let mut dst = [0u8; 8];
    assert_eq!(pipe.read(&mut dst), ReadOutcome::WouldBlock);
}

/// A zero-length read is always a trivial success, even with data pending.
#[test]
fn zero_length_read_is_noop_success() {
    let mut pipe = InboundPipe::new();
    pipe.receive(Bytes::from_static(b"abc"));

    assert_eq!(pipe.read(&mut []), ReadOutcome::Read(0));

    // state is untouched: a real read still returns all three bytes
    let mut dst = [0u8; 3];
    assert_eq!(pipe.read(&mut dst), ReadOutcome::Read(3));
    assert_eq!(&dst, b"abc");
}

/// A second injection before the first is drained appends rather than
/// replacing or failing.
#[test]
fn second_injection_before_drain_appends() {
    let mut pipe = InboundPipe::new();
    pipe.receive(Bytes::from_static(b"hello, "));
    pipe.receive(Bytes::from_static(b"world!"));

    let mut dst = vec![0u8; 13];
    assert_eq!(pipe.read(&mut dst), ReadOutcome::Read(13));
    assert_eq!(&dst, b"hello, world!");
}
