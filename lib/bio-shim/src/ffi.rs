//! The C-vtable adapter: a statically initialized method table and the
//! per-instance object the TLS engine holds a reference-counted pointer to.
//!
//! This is the one module in the workspace that uses `unsafe`: it plays the
//! same role `host::descriptor::socket::inet::legacy_tcp` plays in
//! `shadow-rs` — the seam between a safe Rust wrapper and a raw C-style
//! object whose lifetime is governed by a foreign reference count, not by
//! Rust ownership.

use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_long, c_void};
use std::sync::atomic::{AtomicPtr, AtomicU32, AtomicUsize, Ordering};

use log::warn;

use crate::shim::ShimInner;
use bio_shim_buf::ReadOutcome;

bitflags::bitflags! {
    /// Retry/error indicator bits the TLS engine inspects after a `-1`
    /// return.
    ///
    /// Bit values match OpenSSL's `BIO_FLAGS_*` constants, since a real TLS
    /// engine built against that ABI is exactly what this shim's vtable is
    /// standing in for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RetryFlags: u32 {
        const SHOULD_READ = 0x01;
        const SHOULD_RETRY = 0x08;
    }
}

/// `ctrl` command codes this adapter recognizes. Values match OpenSSL's
/// `BIO_CTRL_*` constants.
mod ctrl_cmd {
    pub const GET_CLOSE: i32 = 8;
    pub const SET_CLOSE: i32 = 9;
    pub const FLUSH: i32 = 11;
}

/// The `GET_CLOSE`/`SET_CLOSE` values themselves (OpenSSL's `BIO_NOCLOSE`/
/// `BIO_CLOSE`).
mod close_flag {
    pub const NOCLOSE: i64 = 0;
    pub const CLOSE: i64 = 1;
}

/// The static method table. Every `Bio` instance created by this crate
/// points at the same one.
#[repr(C)]
pub struct BioMethod {
    pub read: unsafe extern "C" fn(*mut Bio, *mut c_char, c_int) -> c_int,
    pub write: unsafe extern "C" fn(*mut Bio, *const c_char, c_int) -> c_int,
    pub puts: unsafe extern "C" fn(*mut Bio, *const c_char) -> c_int,
    pub gets: unsafe extern "C" fn(*mut Bio, *mut c_char, c_int) -> c_int,
    pub ctrl: unsafe extern "C" fn(*mut Bio, c_int, c_long, *mut c_void) -> c_long,
    pub create: unsafe extern "C" fn(*mut Bio) -> c_int,
    pub destroy: unsafe extern "C" fn(*mut Bio) -> c_int,
}

static METHOD: BioMethod = BioMethod {
    read: bio_read,
    write: bio_write,
    puts: bio_puts,
    gets: bio_gets,
    ctrl: bio_ctrl,
    create: bio_create,
    destroy: bio_destroy,
};

/// A single vtable instance: the value the TLS engine holds a
/// manually-reference-counted pointer to.
///
/// `user_data` is the back-pointer half of the breakable cycle: while
/// non-null, it is an `Rc<RefCell<ShimInner>>` raw pointer obtained via
/// `Rc::into_raw`, owning one strong reference to the shim. `close()` swaps
/// it to null and drops that `Rc`.
#[repr(C)]
pub struct Bio {
    method: *const BioMethod,
    user_data: AtomicPtr<c_void>,
    retry_flags: AtomicU32,
    refcount: AtomicUsize,
}

impl Bio {
    /// Allocates a new instance with one reference count, owning
    /// `user_data` (a raw `Rc<RefCell<ShimInner>>` pointer).
    pub(crate) fn new_boxed(user_data: *mut c_void) -> *mut Bio {
        let bio = Bio {
            method: &METHOD,
            user_data: AtomicPtr::new(user_data),
            retry_flags: AtomicU32::new(0),
            refcount: AtomicUsize::new(1),
        };
        Box::into_raw(Box::new(bio))
    }

    /// Swaps the user-data slot to null, returning whatever was there.
    ///
    /// # Safety
    /// `bio` must point at a live `Bio`.
    pub(crate) unsafe fn take_user_data(bio: *mut Bio) -> *mut c_void {
        unsafe { (*bio).user_data.swap(std::ptr::null_mut(), Ordering::AcqRel) }
    }

    fn set_retry(&self, flags: RetryFlags) {
        self.retry_flags.store(flags.bits(), Ordering::Release);
    }

    /// Observed retry flags, exposed for tests.
    #[cfg(test)]
    pub(crate) fn retry_flags(&self) -> RetryFlags {
        RetryFlags::from_bits_truncate(self.retry_flags.load(Ordering::Acquire))
    }

    /// The method table this instance points at, exposed for tests that want
    /// to drive the callbacks the same way the TLS engine would: through the
    /// vtable, not by calling the crate's internal functions directly.
    #[cfg(test)]
    pub(crate) fn method(&self) -> &'static BioMethod {
        // SAFETY: `method` is always set to `&METHOD` in `new_boxed` and
        // never reassigned.
        unsafe { &*self.method }
    }

    /// Current reference count, exposed for tests.
    #[cfg(test)]
    pub(crate) fn refcount(&self) -> usize {
        self.refcount.load(Ordering::Acquire)
    }
}

/// Bumps `bio`'s reference count.
///
/// # Safety
/// `bio` must point at a live `Bio` with at least one outstanding reference.
pub unsafe fn bio_up_ref(bio: *mut Bio) {
    unsafe { (*bio).refcount.fetch_add(1, Ordering::Relaxed) };
}

/// Releases one reference count on `bio`, freeing it if that was the last
/// one. Does not touch `user_data`; callers that still own a strong
/// reference into the shim via `user_data` are responsible for clearing it
/// first (see [`Shim::close`](crate::Shim::close)).
///
/// # Safety
/// `bio` must point at a live `Bio` with at least one outstanding reference
/// that this call is releasing.
pub unsafe fn bio_free(bio: *mut Bio) {
    let was = unsafe { (*bio).refcount.fetch_sub(1, Ordering::AcqRel) };
    if was == 1 {
        drop(unsafe { Box::from_raw(bio) });
    }
}

/// An owned, retained reference to a [`Bio`], as returned by
/// [`Shim::retained_bio`](crate::Shim::retained_bio). Releases its
/// reference count on drop.
pub struct RetainedBio {
    bio: *mut Bio,
}

impl RetainedBio {
    /// Wraps a `Bio` pointer that the caller has already retained (bumped
    /// the reference count for) on this handle's behalf.
    ///
    /// # Safety
    /// `bio` must point at a live `Bio`, and the caller must not have
    /// already accounted for this reference elsewhere.
    pub(crate) unsafe fn from_raw(bio: *mut Bio) -> Self {
        Self { bio }
    }

    /// The raw pointer the TLS engine's `BIO_new`-equivalent API would take.
    /// Ownership of the reference count stays with this `RetainedBio`; the
    /// TLS engine is expected to retain its own copy if it needs to outlive
    /// this handle.
    pub fn as_ptr(&self) -> *mut Bio {
        self.bio
    }
}

impl Drop for RetainedBio {
    fn drop(&mut self) {
        // SAFETY: this handle owns exactly one reference count, acquired
        // either in `Bio::new_boxed` or via `bio_up_ref` in `retained_bio`.
        unsafe { bio_free(self.bio) };
    }
}

/// Gets a non-owning borrow of the shim behind `bio`'s user-data slot, or
/// `None` if it has been cleared (the shim was closed).
///
/// # Safety
/// `bio` must point at a live `Bio`.
unsafe fn with_shim<R>(bio: *mut Bio, f: impl FnOnce(&mut ShimInner) -> R) -> Option<R> {
    let user_data = unsafe { (*bio).user_data.load(Ordering::Acquire) };
    if user_data.is_null() {
        return None;
    }

    // SAFETY: `user_data`, while non-null, is an `Rc::into_raw` pointer
    // owned by this `Bio`'s user-data slot. We reconstruct it to get at the
    // `RefCell`, but must not drop it here — ownership stays with the slot
    // until `close()` clears it.
    let rc = unsafe { std::mem::ManuallyDrop::new(std::rc::Rc::from_raw(user_data as *const std::cell::RefCell<ShimInner>)) };
    let mut inner = rc.borrow_mut();
    Some(f(&mut inner))
}

pub(crate) unsafe extern "C" fn bio_read(bio: *mut Bio, dst: *mut c_char, len: c_int) -> c_int {
    if len == 0 {
        return unsafe { with_shim(bio, |_shim| ()) }
            .map(|()| 0)
            .unwrap_or_else(|| {
                warn!("read() on a closed shim");
                unsafe { (*bio).set_retry(RetryFlags::empty()) };
                -1
            });
    }

    // SAFETY: the TLS engine promises `dst` is valid for `len` bytes.
    let dst = unsafe { std::slice::from_raw_parts_mut(dst as *mut u8, len.max(0) as usize) };

    let outcome = unsafe { with_shim(bio, |shim| shim.read(dst)) };
    match outcome {
        None => {
            warn!("read() on a closed shim");
            unsafe { (*bio).set_retry(RetryFlags::empty()) };
            -1
        }
        Some(ReadOutcome::Read(n)) => {
            unsafe { (*bio).set_retry(RetryFlags::empty()) };
            n as c_int
        }
        Some(ReadOutcome::WouldBlock) => {
            unsafe { (*bio).set_retry(RetryFlags::SHOULD_RETRY | RetryFlags::SHOULD_READ) };
            -1
        }
    }
}

pub(crate) unsafe extern "C" fn bio_write(bio: *mut Bio, src: *const c_char, len: c_int) -> c_int {
    if len == 0 {
        return unsafe { with_shim(bio, |_shim| ()) }
            .map(|()| 0)
            .unwrap_or_else(|| {
                warn!("write() on a closed shim");
                unsafe { (*bio).set_retry(RetryFlags::empty()) };
                -1
            });
    }

    // SAFETY: the TLS engine promises `src` is valid for `len` bytes.
    let src = unsafe { std::slice::from_raw_parts(src as *const u8, len.max(0) as usize) };

    let wrote = unsafe { with_shim(bio, |shim| shim.write(src)) };
    match wrote {
        None => {
            warn!("write() on a closed shim");
            unsafe { (*bio).set_retry(RetryFlags::empty()) };
            -1
        }
        Some(Ok(())) => {
            unsafe { (*bio).set_retry(RetryFlags::empty()) };
            len
        }
        Some(Err(err)) => {
            warn!("outbound allocation failed: {err:?}");
            unsafe { (*bio).set_retry(RetryFlags::empty()) };
            -1
        }
    }
}

pub(crate) unsafe extern "C" fn bio_puts(bio: *mut Bio, s: *const c_char) -> c_int {
    // SAFETY: the TLS engine promises `s` is a valid NUL-terminated string.
    let c_str = unsafe { CStr::from_ptr(s) };
    let bytes = c_str.to_bytes();
    let len = c_int::try_from(bytes.len()).unwrap_or(c_int::MAX);
    unsafe { bio_write(bio, s, len) }
}

pub(crate) unsafe extern "C" fn bio_gets(bio: *mut Bio, _dst: *mut c_char, _len: c_int) -> c_int {
    // Line-oriented reads are not supported; always refuse.
    unsafe { (*bio).set_retry(RetryFlags::empty()) };
    -2
}

pub(crate) unsafe extern "C" fn bio_ctrl(bio: *mut Bio, cmd: c_int, arg1: c_long, _arg2: *mut c_void) -> c_long {
    match cmd {
        ctrl_cmd::GET_CLOSE => {
            let flag = unsafe { with_shim(bio, |shim| shim.get_close_flag()) };
            match flag {
                Some(true) => close_flag::CLOSE as c_long,
                Some(false) => close_flag::NOCLOSE as c_long,
                None => {
                    warn!("ctrl(GET_CLOSE) on a closed shim");
                    -1
                }
            }
        }
        ctrl_cmd::SET_CLOSE => {
            let set = unsafe {
                with_shim(bio, |shim| {
                    shim.set_close_flag(arg1 != close_flag::NOCLOSE as c_long)
                })
            };
            match set {
                Some(()) => 1,
                None => {
                    warn!("ctrl(SET_CLOSE) on a closed shim");
                    -1
                }
            }
        }
        ctrl_cmd::FLUSH => {
            let flushed = unsafe { with_shim(bio, |_shim| ()) };
            match flushed {
                Some(()) => 1,
                None => {
                    warn!("ctrl(FLUSH) on a closed shim");
                    -1
                }
            }
        }
        _ => {
            let recognized = unsafe { with_shim(bio, |_shim| ()) };
            match recognized {
                Some(()) => 0,
                None => {
                    warn!("ctrl({cmd}) on a closed shim");
                    -1
                }
            }
        }
    }
}

pub(crate) unsafe extern "C" fn bio_create(bio: *mut Bio) -> c_int {
    unsafe { (*bio).user_data.store(std::ptr::null_mut(), Ordering::Release) };
    1
}

pub(crate) unsafe extern "C" fn bio_destroy(bio: *mut Bio) -> c_int {
    // The shim is owned application-side; this only releases whatever
    // strong reference the user-data slot still held (if `close()` was
    // never called before the TLS engine dropped its last reference).
    let user_data = unsafe { Bio::take_user_data(bio) };
    if !user_data.is_null() {
        drop(unsafe { std::rc::Rc::from_raw(user_data as *const std::cell::RefCell<ShimInner>) });
    }
    1
}
