/// Failures from the buffer layer.
///
/// Kept as a bare enum rather than a `thiserror`-derived type: there's a
/// single leaf variant with no source chain to preserve, same as
/// `tcp::{SendError, RecvError}` in this codebase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufError {
    /// The allocator couldn't produce a buffer of the requested capacity.
    AllocationFailed { requested_capacity: usize },
}
