use bytes::{Bytes, BytesMut};
use log::trace;

use crate::allocator::ByteAllocator;
use crate::error::BufError;
use crate::retain::RetainPolicy;

/// A buffer handed to the host by [`OutboundPipe::extract`].
///
/// Wraps a frozen `bytes::Bytes` together with the capacity its backing
/// `BytesMut` had at freeze time. `Bytes` itself doesn't expose `.capacity()`
/// (only `BytesMut` does), so we carry it alongside rather than trying to
/// recover it later.
#[derive(Debug, Clone)]
pub struct OutboundBuf {
    data: Bytes,
    capacity_at_extraction: usize,
}

impl OutboundBuf {
    /// The ciphertext bytes themselves.
    pub fn readable_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The backing capacity this buffer's storage had when it was extracted,
    /// independent of whatever the pipe's live buffer has grown or shrunk to
    /// since.
    pub fn capacity(&self) -> usize {
        self.capacity_at_extraction
    }

    /// The address of the first readable byte, for reference-equality
    /// checks. Two `OutboundBuf`s compare equal here iff they were produced
    /// from the same backing allocation at the same offset, i.e. the shim
    /// reused storage rather than reallocating between extractions.
    pub fn backing_address(&self) -> usize {
        self.data.as_ptr() as usize
    }
}

/// The outbound (TLS → network) half of the shim: the `write` callback
/// target and the `extract` source.
///
/// Internally holds a live `BytesMut` that writes accumulate into, plus a
/// clone of the most recently extracted `Bytes` so that the next write can
/// try to reclaim the same storage via `Bytes::try_into_mut` if the host has
/// already dropped its copy. This is the same "maybe reclaim the write
/// buffer" pattern other `bytes`-based protocol implementations use; here it
/// does double duty as both allocation amortization and the copy-on-write
/// semantics the outbound side needs.
pub struct OutboundPipe<A: ByteAllocator> {
    allocator: A,
    policy: RetainPolicy,
    live: BytesMut,
    reclaimable: Option<Bytes>,
}

/// A reasonable first allocation for a freshly (re)created outbound buffer,
/// used only when the retain policy doesn't already imply a size.
const DEFAULT_INITIAL_CAPACITY: usize = 4096;

impl<A: ByteAllocator> OutboundPipe<A> {
    pub fn new(allocator: A, policy: RetainPolicy) -> Self {
        Self {
            allocator,
            policy,
            live: BytesMut::new(),
            reclaimable: None,
        }
    }

    /// Appends `src` to the outbound buffer.
    ///
    /// A zero-length write is a pure no-op: it must not allocate or disturb
    /// any previously extracted buffer. On allocator failure, the buffer is
    /// left exactly as it was before the call.
    pub fn write(&mut self, src: &[u8]) -> Result<(), BufError> {
        if src.is_empty() {
            return Ok(());
        }

        self.ensure_live_buffer(src.len())?;
        self.live.extend_from_slice(src);
        Ok(())
    }

    /// Makes sure `self.live` can be written into, reclaiming the previous
    /// extraction's storage if we're its sole remaining owner, or falling
    /// back to a fresh allocation otherwise.
    fn ensure_live_buffer(&mut self, hint: usize) -> Result<(), BufError> {
        if self.live.capacity() > 0 {
            return Ok(());
        }

        if let Some(prev) = self.reclaimable.take() {
            match prev.try_into_mut() {
                Ok(mut reclaimed) => {
                    trace!("reclaiming previous outbound buffer's storage ({} bytes capacity)", reclaimed.capacity());
                    reclaimed.clear();
                    self.live = reclaimed;
                    return Ok(());
                }
                Err(_shared) => {
                    trace!("previous outbound buffer is still shared with the host; allocating fresh storage");
                }
            }
        }

        let want = self.policy.bound().unwrap_or(DEFAULT_INITIAL_CAPACITY).max(hint);
        self.live = self.allocator.allocate(want)?;
        Ok(())
    }

    /// Takes the accumulated outbound buffer, leaving the pipe with a fresh
    /// empty one.
    pub fn extract(&mut self) -> Option<OutboundBuf> {
        if self.live.is_empty() {
            return None;
        }

        let capacity_at_extraction = self.live.capacity();
        let frozen = std::mem::take(&mut self.live).freeze();

        // The retain decision happens here, eagerly, rather than being
        // deferred to the next write — see DESIGN.md for why.
        if self.policy.exceeds(capacity_at_extraction) {
            trace!(
                "outbound backing capacity {capacity_at_extraction} exceeds retain policy; discarding"
            );
            self.reclaimable = None;
        } else {
            self.reclaimable = Some(frozen.clone());
        }

        Some(OutboundBuf {
            data: frozen,
            capacity_at_extraction,
        })
    }

    /// The live (not-yet-extracted) buffer's current backing capacity.
    pub fn current_capacity(&self) -> usize {
        self.live.capacity()
    }
}
