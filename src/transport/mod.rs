//! Byte-level bus transports. No protocol knowledge lives here.

pub mod mock;
pub mod serial;

pub use mock::MockTransport;
pub use serial::SerialTransport;

use crate::error::Result;

/// Half-duplex byte access to the shared servo bus.
///
/// One transport is exclusively owned by one [`Bus`](crate::Bus) session;
/// calls are blocking and strictly sequential.
pub trait Transport: Send {
    /// Write the whole buffer to the line. Partial writes are retried
    /// internally; a hard I/O error aborts and is not retried here.
    fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Read exactly `buf.len()` bytes, failing with
    /// [`Error::Timeout`](crate::Error::Timeout) if the configured receive
    /// deadline elapses first.
    fn recv_exact(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Drop any bytes already waiting in the input buffer, returning how
    /// many were discarded. Called before every instruction so that a
    /// stale or corrupted response cannot leak into the next transaction.
    fn discard_input(&mut self) -> Result<usize>;
}
