#![forbid(unsafe_code)]

//! Buffer and allocator primitives backing the TLS byte-buffer shim.
//!
//! This crate is sans-I/O: it knows nothing about the TLS engine's C vtable
//! or about sockets. It just accepts bytes and hands bytes back, the same
//! way `tcp` accepts and hands back packets. The `bio-shim` crate wires this
//! up to lifecycle/closing semantics and the C-ABI callback table.

mod allocator;
mod error;
mod inbound;
mod outbound;
mod retain;

#[cfg(test)]
mod tests;

pub use allocator::{BytesAllocator, ByteAllocator};
pub use error::BufError;
pub use inbound::{InboundPipe, ReadOutcome};
pub use outbound::{OutboundBuf, OutboundPipe};
pub use retain::RetainPolicy;
