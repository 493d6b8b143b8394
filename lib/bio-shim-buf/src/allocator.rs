use bytes::BytesMut;

use crate::error::BufError;

/// The allocator contract the host supplies. An implementation's only job is
/// to hand back a buffer with at least the requested writable capacity, or
/// report that it couldn't.
pub trait ByteAllocator {
    /// Produce a buffer whose writable capacity is at least `capacity`.
    fn allocate(&self, capacity: usize) -> Result<BytesMut, BufError>;
}

/// Default allocator backing outbound buffers with the `bytes` crate.
///
/// `BytesMut`/`Bytes` already give us everything an outbound buffer needs:
/// appending (`extend_from_slice`), a readable view (`Deref<Target = [u8]>`),
/// a reader cursor (`split_to`), and — via `Bytes::try_into_mut` — a public
/// "is this uniquely owned" hook, which is exactly the copy-on-write check
/// the outbound pipe needs. Its allocation itself can't fail short of the
/// process aborting on OOM, but the trait still reports failure so that host
/// allocators backed by a bounded pool can say no.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytesAllocator;

impl ByteAllocator for BytesAllocator {
    fn allocate(&self, capacity: usize) -> Result<BytesMut, BufError> {
        Ok(BytesMut::with_capacity(capacity))
    }
}

impl ByteAllocator for Box<dyn ByteAllocator> {
    fn allocate(&self, capacity: usize) -> Result<BytesMut, BufError> {
        (**self).allocate(capacity)
    }
}
