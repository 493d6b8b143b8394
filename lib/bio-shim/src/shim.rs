use std::cell::RefCell;
use std::rc::Rc;

use bio_shim_buf::{ByteAllocator, InboundPipe, OutboundBuf, OutboundPipe, ReadOutcome, RetainPolicy};
use bytes::Bytes;
use log::trace;

use crate::ffi::{self, RetainedBio};

/// The shared state behind a [`Shim`]. Lives behind an `Rc<RefCell<_>>` so
/// that the C vtable's user-data slot can hold a second, independent strong
/// reference to it, forming a cycle that `close()` explicitly breaks.
pub(crate) struct ShimInner {
    outbound: OutboundPipe<Box<dyn ByteAllocator>>,
    inbound: InboundPipe,
    closed: bool,
    shutdown_flag: bool,
    /// The vtable instance this shim has lazily created, if any. The shim
    /// holds exactly one reference count on it via this field; each
    /// `retained_bio()` call hands out one more to its caller.
    retained_bio: Option<*mut ffi::Bio>,
}

impl ShimInner {
    pub(crate) fn read(&mut self, dst: &mut [u8]) -> ReadOutcome {
        self.inbound.read(dst)
    }

    pub(crate) fn write(&mut self, src: &[u8]) -> Result<(), bio_shim_buf::BufError> {
        self.outbound.write(src)
    }

    pub(crate) fn get_close_flag(&self) -> bool {
        self.shutdown_flag
    }

    pub(crate) fn set_close_flag(&mut self, value: bool) {
        self.shutdown_flag = value;
    }
}

/// Host-facing handle onto the buffer-backed BIO shim.
///
/// Not `Send`/`Sync`: every host call and every TLS-engine callback is
/// expected to run on one serialized execution context, so `Shim` is built
/// on `Rc<RefCell<_>>` rather than `Arc<Mutex<_>>`, the same way `tcp`'s
/// `TcpState` is built on plain `Rc<RefCell<_>>` rather than anything
/// thread-safe.
pub struct Shim {
    inner: Rc<RefCell<ShimInner>>,
}

impl Shim {
    /// Both buffers start empty, `closed = false`, and the shutdown flag
    /// starts `true` — the TLS-engine-standard default: release the
    /// underlying resource when the vtable instance is freed.
    pub fn new(allocator: impl ByteAllocator + 'static, policy: RetainPolicy) -> Self {
        let inner = ShimInner {
            outbound: OutboundPipe::new(Box::new(allocator) as Box<dyn ByteAllocator>, policy),
            inbound: InboundPipe::new(),
            closed: false,
            shutdown_flag: true,
            retained_bio: None,
        };

        Self {
            inner: Rc::new(RefCell::new(inner)),
        }
    }

    /// Returns a retained handle to this shim's C-vtable instance.
    ///
    /// Lazily constructs the C-vtable instance on first call, installing a
    /// strong back-reference to this shim in its user-data slot. Every call
    /// (including the first) returns one newly retained handle; the caller
    /// owns exactly one release.
    pub fn retained_bio(&self) -> RetainedBio {
        let mut inner = self.inner.borrow_mut();

        let bio = match inner.retained_bio {
            Some(bio) => bio,
            None => {
                trace!("lazily constructing the retained BIO vtable instance");
                // one strong reference, handed to the C side's user-data slot
                let user_data = Rc::into_raw(self.inner.clone());
                let bio = ffi::Bio::new_boxed(user_data as *mut libc::c_void);
                inner.retained_bio = Some(bio);
                bio
            }
        };

        // SAFETY: `bio` was either just constructed above or was previously
        // constructed by this same function and is still alive (we hold one
        // of its reference counts in `inner.retained_bio`).
        unsafe { ffi::bio_up_ref(bio) };

        // SAFETY: we just incremented the reference count for this handle.
        unsafe { RetainedBio::from_raw(bio) }
    }

    /// Closes the shim. Idempotent. Clears the vtable's user-data slot
    /// (dropping its strong reference back to this shim) and releases this
    /// shim's own reference to the vtable instance, breaking the cycle. Does
    /// not free the vtable: the TLS engine may still be holding references
    /// handed out by [`Shim::retained_bio`].
    pub fn close(&self) {
        let mut inner = self.inner.borrow_mut();

        if inner.closed {
            return;
        }
        inner.closed = true;

        if let Some(bio) = inner.retained_bio.take() {
            // SAFETY: `bio` is a live vtable instance we own one reference
            // count on (about to be released below).
            let user_data = unsafe { ffi::Bio::take_user_data(bio) };
            if !user_data.is_null() {
                // SAFETY: this pointer was produced by `Rc::into_raw` in
                // `retained_bio` and has not been converted back since.
                drop(unsafe { Rc::from_raw(user_data as *const RefCell<ShimInner>) });
            }
            // SAFETY: releases the one reference count this shim held.
            unsafe { ffi::bio_free(bio) };
        }
    }

    /// Injects ciphertext received from the network.
    pub fn receive_from_network(&self, buf: Bytes) {
        self.inner.borrow_mut().inbound.receive(buf);
    }

    /// Takes the accumulated outbound ciphertext, if any.
    pub fn outbound_ciphertext(&self) -> Option<OutboundBuf> {
        self.inner.borrow_mut().outbound.extract()
    }

    /// The live (not-yet-extracted) outbound buffer's current backing
    /// capacity, exposed for tests.
    pub fn current_outbound_capacity(&self) -> usize {
        self.inner.borrow().outbound.current_capacity()
    }

    /// The current value of the shutdown/close-on-free flag, exposed for
    /// tests; the C vtable reaches this via `ctrl`, not this method.
    #[cfg(test)]
    pub(crate) fn shutdown_flag(&self) -> bool {
        self.inner.borrow().shutdown_flag
    }
}

impl Drop for Shim {
    fn drop(&mut self) {
        // `close` is idempotent and safe to call from `Drop`: if the host
        // already closed explicitly, this is a no-op.
        self.close();
    }
}
