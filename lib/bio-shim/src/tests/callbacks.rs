use std::os::raw::c_char;

use bio_shim_buf::{BytesAllocator, RetainPolicy};
use bytes::Bytes;

use crate::Shim;

fn new_shim() -> Shim {
    Shim::new(BytesAllocator, RetainPolicy::Unbounded)
}

#[test]
fn write_through_vtable_is_visible_as_outbound_ciphertext() {
    let shim = new_shim();
    let retained = shim.retained_bio();
    let bio = retained.as_ptr();

    let payload = b"client hello";
    let n = unsafe {
        let method = (*bio).method();
        (method.write)(bio, payload.as_ptr() as *const c_char, payload.len() as i32)
    };
    assert_eq!(n, payload.len() as i32);

    let extracted = shim.outbound_ciphertext().expect("bytes were written");
    assert_eq!(extracted.readable_bytes(), payload);
}

#[test]
fn read_through_vtable_drains_injected_ciphertext() {
    let shim = new_shim();
    shim.receive_from_network(Bytes::from_static(b"server hello"));

    let retained = shim.retained_bio();
    let bio = retained.as_ptr();

    let mut dst = [0u8; 12];
    let n = unsafe {
        let method = (*bio).method();
        (method.read)(bio, dst.as_mut_ptr() as *mut c_char, dst.len() as i32)
    };
    assert_eq!(n, 12);
    assert_eq!(&dst, b"server hello");
}

#[test]
fn read_through_vtable_would_block_sets_retry_flags() {
    let shim = new_shim();
    let retained = shim.retained_bio();
    let bio = retained.as_ptr();

    let mut dst = [0u8; 4];
    let n = unsafe {
        let method = (*bio).method();
        (method.read)(bio, dst.as_mut_ptr() as *mut c_char, dst.len() as i32)
    };
    assert_eq!(n, -1);

    let flags = unsafe { (*bio).retry_flags() };
    assert!(flags.contains(crate::ffi::RetryFlags::SHOULD_RETRY));
    assert!(flags.contains(crate::ffi::RetryFlags::SHOULD_READ));
}

#[test]
fn zero_length_read_and_write_are_noops() {
    let shim = new_shim();
    let retained = shim.retained_bio();
    let bio = retained.as_ptr();

    let n_write = unsafe {
        let method = (*bio).method();
        (method.write)(bio, std::ptr::null(), 0)
    };
    assert_eq!(n_write, 0);

    let n_read = unsafe {
        let method = (*bio).method();
        (method.read)(bio, std::ptr::null_mut(), 0)
    };
    assert_eq!(n_read, 0);

    assert!(shim.outbound_ciphertext().is_none());
}

#[test]
fn puts_forwards_to_write_as_the_nul_terminated_length() {
    let shim = new_shim();
    let retained = shim.retained_bio();
    let bio = retained.as_ptr();

    let s = std::ffi::CString::new("HELLO\r\n").unwrap();
    let n = unsafe {
        let method = (*bio).method();
        (method.puts)(bio, s.as_ptr())
    };
    assert_eq!(n, 7);

    let extracted = shim.outbound_ciphertext().unwrap();
    assert_eq!(extracted.readable_bytes(), b"HELLO\r\n");
}

#[test]
fn gets_is_always_unsupported() {
    let shim = new_shim();
    let retained = shim.retained_bio();
    let bio = retained.as_ptr();

    let mut dst = [0u8; 16];
    let n = unsafe {
        let method = (*bio).method();
        (method.gets)(bio, dst.as_mut_ptr() as *mut c_char, dst.len() as i32)
    };
    assert_eq!(n, -2);
}

#[test]
fn zero_length_read_and_write_on_a_closed_shim_are_fatal() {
    let shim = new_shim();
    let retained = shim.retained_bio();
    shim.close();

    let bio = retained.as_ptr();

    let n_write = unsafe {
        let method = (*bio).method();
        (method.write)(bio, std::ptr::null(), 0)
    };
    assert_eq!(n_write, -1);

    let n_read = unsafe {
        let method = (*bio).method();
        (method.read)(bio, std::ptr::null_mut(), 0)
    };
    assert_eq!(n_read, -1);
}

#[test]
fn write_on_a_closed_shim_is_fatal() {
    let shim = new_shim();
    let retained = shim.retained_bio();
    shim.close();

    let bio = retained.as_ptr();
    let payload = b"too late";
    let n = unsafe {
        let method = (*bio).method();
        (method.write)(bio, payload.as_ptr() as *const c_char, payload.len() as i32)
    };
    assert_eq!(n, -1);
}
