//! Scripted in-memory transport for tests.
//!
//! Frames sent by the session are recorded verbatim; received bytes come
//! from a queue the test fills in advance. An empty queue behaves like a
//! silent bus: `recv_exact` times out. Tests can also plant stale bytes
//! that sit in the receive buffer ahead of any queued reply, the way the
//! tail of a late response would on a real port.

use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::transport::Transport;

#[derive(Default)]
pub struct MockTransport {
    sent: Vec<Vec<u8>>,
    stale: VecDeque<u8>,
    rx: VecDeque<u8>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes to be returned by subsequent `recv_exact` calls.
    pub fn queue_reply(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes);
    }

    /// Plant bytes that are already sitting in the receive buffer, ahead
    /// of every queued reply. `discard_input` drops them; an unflushed
    /// `recv_exact` would read them first.
    pub fn inject_stale(&mut self, bytes: &[u8]) {
        self.stale.extend(bytes);
    }

    /// Every buffer written through `send`, one entry per call.
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    pub fn take_sent(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.sent)
    }
}

impl Transport for MockTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.sent.push(bytes.to_vec());
        Ok(())
    }

    fn recv_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.stale.len() + self.rx.len() < buf.len() {
            // a silent (or slow) bus looks like a timeout to the caller
            return Err(Error::Timeout);
        }
        for slot in buf.iter_mut() {
            *slot = self
                .stale
                .pop_front()
                .or_else(|| self.rx.pop_front())
                .unwrap();
        }
        Ok(())
    }

    fn discard_input(&mut self) -> Result<usize> {
        // Queued replies model bytes the device has not sent yet; only
        // planted stale bytes count as flushable input.
        let dropped = self.stale.len();
        self.stale.clear();
        Ok(dropped)
    }
}
