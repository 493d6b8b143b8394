use bytes::{Bytes, BytesMut};
use log::debug;

/// Outcome of a [`InboundPipe::read`] call, mirroring the signals the TLS
/// engine's `read` callback needs to distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Copied `n` bytes (`n` may be 0 only when the caller asked for 0).
    Read(usize),
    /// No data available right now; the TLS engine should retry later.
    WouldBlock,
}

/// The inbound (network → TLS) half of the shim: the `receiveFromNetwork`
/// sink and the `read` callback source.
///
/// Holds at most one pending buffer, consumed destructively from the front.
/// A second injection before the first is drained appends into a single
/// logical stream (see DESIGN.md for why append was picked over
/// replace-or-fail).
#[derive(Default)]
pub struct InboundPipe {
    pending: Option<Bytes>,
}

impl InboundPipe {
    pub fn new() -> Self {
        Self { pending: None }
    }

    /// Injects ciphertext received from the network.
    pub fn receive(&mut self, buf: Bytes) {
        if buf.is_empty() {
            return;
        }

        match self.pending.take() {
            None => self.pending = Some(buf),
            Some(existing) => {
                debug!(
                    "appending {} bytes to {} bytes of undrained inbound data",
                    buf.len(),
                    existing.len()
                );
                let mut combined = BytesMut::with_capacity(existing.len() + buf.len());
                combined.extend_from_slice(&existing);
                combined.extend_from_slice(&buf);
                self.pending = Some(combined.freeze());
            }
        }
    }

    /// Copies up to `dst.len()` bytes from the front of the pending buffer.
    pub fn read(&mut self, dst: &mut [u8]) -> ReadOutcome {
        if dst.is_empty() {
            return ReadOutcome::Read(0);
        }

        let Some(buf) = self.pending.as_mut() else {
            return ReadOutcome::WouldBlock;
        };

        if buf.is_empty() {
            self.pending = None;
            return ReadOutcome::WouldBlock;
        }

        let n = dst.len().min(buf.len());
        let chunk = buf.split_to(n);
        dst[..n].copy_from_slice(&chunk);

        if buf.is_empty() {
            self.pending = None;
        }

        ReadOutcome::Read(n)
    }
}
