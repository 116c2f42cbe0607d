//! Serial port transport backed by the `serialport` crate.

use std::io::{Read, Write};
use std::time::Duration;

use serialport::SerialPort;

use crate::error::{Error, Result};
use crate::transport::Transport;

/// Exclusive handle on one serial line.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open and configure the serial device at `path`.
    ///
    /// `timeout` is the per-call receive deadline; it applies independently
    /// to each blocking read issued by the session.
    pub fn open(path: &str, baudrate: u32, timeout: Duration) -> Result<Self> {
        let port = serialport::new(path, baudrate)
            .timeout(timeout)
            .open()
            .map_err(|source| Error::Connection {
                path: path.to_string(),
                source,
            })?;
        Ok(SerialTransport { port })
    }
}

impl Transport for SerialTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        // write_all loops over partial writes until the buffer is flushed
        // or a hard error surfaces.
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn recv_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.port.read_exact(buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                Error::Timeout
            } else {
                Error::Io(e)
            }
        })
    }

    fn discard_input(&mut self) -> Result<usize> {
        let pending = self.port.bytes_to_read().map_err(std::io::Error::from)? as usize;
        if pending > 0 {
            let mut trash = vec![0u8; pending];
            self.port.read_exact(&mut trash).map_err(Error::Io)?;
        }
        Ok(pending)
    }
}
