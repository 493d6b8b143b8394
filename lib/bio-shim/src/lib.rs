//! Host-facing shim that adapts a TLS engine's C-style pluggable-I/O object
//! (BIO-style: `read`/`write`/`puts`/`gets`/`ctrl`) to a pair of
//! application-owned byte buffers.
//!
//! [`shim`] is the safe, host-facing half (construct, close, extract
//! outbound ciphertext, inject inbound ciphertext). [`ffi`] is the
//! `unsafe`-bearing half that exposes that state through a C-ABI vtable; it
//! is the only module in this crate (and, transitively, in this workspace —
//! `bio-shim-buf` is `#![forbid(unsafe_code)]`) that uses `unsafe`.

pub mod ffi;
mod shim;

#[cfg(test)]
mod tests;

pub use bio_shim_buf::{BufError, ByteAllocator, BytesAllocator, ReadOutcome, RetainPolicy};
pub use ffi::RetainedBio;
pub use shim::Shim;
