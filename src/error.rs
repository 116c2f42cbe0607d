//! Error taxonomy for bus sessions.
//!
//! Connection errors are fatal to session construction; everything else is
//! fatal to the in-progress call only and leaves the session usable.

use crate::register::{Access, Value};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The serial device could not be opened or configured.
    #[error("failed to open serial port {path}: {source}")]
    Connection {
        path: String,
        #[source]
        source: serialport::Error,
    },

    /// Byte-level transport failure.
    #[error("serial i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// No status frame arrived within the configured receive timeout.
    #[error("timed out waiting for a status frame")]
    Timeout,

    /// Received bytes do not parse as a status frame.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The device answered with one or more fault bits set.
    /// Surfaced verbatim and never retried here: retrying a rejected
    /// command is usually wrong.
    #[error("device {id} reported {status}")]
    Device { id: u8, status: DeviceStatus },

    /// The value cannot be encoded for this register. Detected before any
    /// bytes touch the bus.
    #[error("value {value:?} out of range for register `{register}`")]
    Range {
        register: &'static str,
        value: Value,
    },

    /// The register's access mode forbids this operation. Detected before
    /// any bytes touch the bus.
    #[error("register `{register}` is {access:?}")]
    Access {
        register: &'static str,
        access: Access,
    },
}

/// Wire-level parse failures. Recoverable: the caller may retry the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame header")]
    Framing,

    #[error("checksum mismatch (expected {expected:#04x}, got {got:#04x})")]
    ChecksumMismatch { expected: u16, got: u16 },

    #[error("status frame from id {got} while waiting for id {expected}")]
    UnexpectedId { expected: u8, got: u8 },

    #[error("frame of {len} bytes exceeds the firmware limit")]
    FrameTooLong { len: usize },
}

/// Raw fault byte from a status frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStatus(pub u8);

impl DeviceStatus {
    pub fn is_ok(self) -> bool {
        self.0 == 0
    }

    pub fn faults(self) -> Vec<DeviceFault> {
        (0..7)
            .filter(|bit| self.0 & (1 << bit) != 0)
            .filter_map(DeviceFault::from_bit)
            .collect()
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "faults {:?} ({:#04x})", self.faults(), self.0)
    }
}

/// Decoded fault bits, one per alarm condition in the servo firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFault {
    InputVoltage,
    AngleLimit,
    Overheat,
    Range,
    Checksum,
    Overload,
    Instruction,
}

impl DeviceFault {
    fn from_bit(bit: u8) -> Option<Self> {
        match bit {
            0 => Some(DeviceFault::InputVoltage),
            1 => Some(DeviceFault::AngleLimit),
            2 => Some(DeviceFault::Overheat),
            3 => Some(DeviceFault::Range),
            4 => Some(DeviceFault::Checksum),
            5 => Some(DeviceFault::Overload),
            6 => Some(DeviceFault::Instruction),
            _ => None,
        }
    }
}
