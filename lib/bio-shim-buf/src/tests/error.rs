use crate::{BufError, ByteAllocator, OutboundPipe, RetainPolicy};
use bytes::BytesMut;

struct RefusingAllocator;

impl ByteAllocator for RefusingAllocator {
    fn allocate(&self, capacity: usize) -> Result<BytesMut, BufError> {
        Err(BufError::AllocationFailed {
            requested_capacity: capacity,
        })
    }
}

#[test]
fn write_reports_allocator_failure() {
    let mut pipe = OutboundPipe::new(RefusingAllocator, RetainPolicy::Unbounded);

    let err = pipe.write(b"hello").unwrap_err();
    assert_eq!(
        err,
        BufError::AllocationFailed {
            requested_capacity: 4096
        }
    );

    // state is untouched: there is nothing to extract
    assert!(pipe.extract().is_none());
}
