//! SCS/STS wire protocol: frame anatomy, instruction codes, checksums.
//!
//! Every frame on the bus looks like
//!
//! ```text
//! FF FF | id | len | instr/status | params ... | checksum
//! ```
//!
//! where `len` counts everything after itself (instruction byte, parameter
//! bytes and the checksum). Serialization is deterministic: the same
//! instruction always produces the same bytes, which the frame tests assert
//! exactly.

use crate::error::{DeviceStatus, ProtocolError};

/* ───── Packet anatomy ─────────────────────────────────────────────── */
pub const HDR_BYTE: u8 = 0xFF; // sync byte
pub const HEADER: [u8; 2] = [HDR_BYTE, HDR_BYTE];
/// Bytes read before the length field is known: FF FF ID LEN.
pub const HEADER_LEN: usize = 4;
/// Absolute frame size limit enforced by the servo firmware.
pub const FRAME_MAX_LEN: usize = 250;

/* ───── Basic ids ──────────────────────────────────────────────────── */
pub const BROADCAST_ID: u8 = 0xFE; // 254
pub const MAX_ID: u8 = 0xFC; // 252

/* ───── Instructions ───────────────────────────────────────────────── */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Ping,
    Read,
    Write,
    SyncRead,
    SyncWrite,
}

impl Instruction {
    pub fn code(self) -> u8 {
        match self {
            Instruction::Ping => 0x01,
            Instruction::Read => 0x02,
            Instruction::Write => 0x03,
            Instruction::SyncRead => 0x82,
            Instruction::SyncWrite => 0x83,
        }
    }
}

/* ───── Checksum strategies ────────────────────────────────────────── */

/// Checksum algorithm used by the protocol variant on the bus.
///
/// The algorithm is a session-wide choice, not a per-frame one; both
/// strategies cover the bytes between the header and the checksum field
/// (id, length, instruction/status and parameters).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Checksum {
    /// One's-complement running sum, one byte. Used by SCS/STS servos.
    #[default]
    Sum,
    /// CRC-16/IBM, two bytes little-endian.
    Crc16,
}

impl Checksum {
    /// Width of the checksum field in bytes.
    pub fn width(self) -> usize {
        match self {
            Checksum::Sum => 1,
            Checksum::Crc16 => 2,
        }
    }

    fn compute(self, data: &[u8]) -> u16 {
        match self {
            Checksum::Sum => {
                let sum = data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
                u16::from(!sum)
            }
            Checksum::Crc16 => crc16::State::<crc16::ARC>::calculate(data),
        }
    }

    fn append(self, frame: &mut Vec<u8>) {
        let value = self.compute(&frame[2..]);
        match self {
            Checksum::Sum => frame.push(value as u8),
            Checksum::Crc16 => frame.extend_from_slice(&value.to_le_bytes()),
        }
    }

    fn verify(self, frame: &[u8]) -> Result<(), ProtocolError> {
        let body_end = frame.len() - self.width();
        let expected = self.compute(&frame[2..body_end]);
        let got = match self {
            Checksum::Sum => u16::from(frame[body_end]),
            Checksum::Crc16 => u16::from_le_bytes([frame[body_end], frame[body_end + 1]]),
        };
        if expected != got {
            return Err(ProtocolError::ChecksumMismatch { expected, got });
        }
        Ok(())
    }
}

/* ───── Outgoing frames ────────────────────────────────────────────── */

#[derive(Debug, Clone)]
pub struct InstructionFrame {
    pub id: u8,
    pub instruction: Instruction,
    pub params: Vec<u8>,
}

impl InstructionFrame {
    pub fn ping(id: u8) -> Self {
        InstructionFrame {
            id,
            instruction: Instruction::Ping,
            params: vec![],
        }
    }

    pub fn read(id: u8, addr: u8, length: u8) -> Self {
        InstructionFrame {
            id,
            instruction: Instruction::Read,
            params: vec![addr, length],
        }
    }

    pub fn write(id: u8, addr: u8, data: &[u8]) -> Self {
        let mut params = vec![addr];
        params.extend_from_slice(data);
        InstructionFrame {
            id,
            instruction: Instruction::Write,
            params,
        }
    }

    /// Broadcast read of `length` bytes at `addr` from every id listed.
    pub fn sync_read(addr: u8, length: u8, ids: &[u8]) -> Self {
        let mut params = vec![addr, length];
        params.extend_from_slice(ids);
        InstructionFrame {
            id: BROADCAST_ID,
            instruction: Instruction::SyncRead,
            params,
        }
    }

    /// Broadcast write of one `data_len`-byte blob per device. Entries are
    /// serialized in the order given; the caller is responsible for imposing
    /// a deterministic order.
    pub fn sync_write(addr: u8, data_len: u8, entries: &[(u8, Vec<u8>)]) -> Self {
        let mut params = vec![addr, data_len];
        for (id, data) in entries {
            params.push(*id);
            params.extend_from_slice(data);
        }
        InstructionFrame {
            id: BROADCAST_ID,
            instruction: Instruction::SyncWrite,
            params,
        }
    }

    /// Serialize the frame, rejecting anything the firmware's
    /// [`FRAME_MAX_LEN`] limit (or the one-byte length field) cannot carry.
    pub fn to_bytes(&self, checksum: Checksum) -> Result<Vec<u8>, ProtocolError> {
        let len = self.params.len() + 1 + checksum.width();
        if HEADER_LEN + len > FRAME_MAX_LEN {
            return Err(ProtocolError::FrameTooLong {
                len: HEADER_LEN + len,
            });
        }

        let mut bytes = Vec::with_capacity(HEADER_LEN + len);
        bytes.extend_from_slice(&HEADER);
        bytes.push(self.id);
        bytes.push(len as u8);
        bytes.push(self.instruction.code());
        bytes.extend_from_slice(&self.params);
        checksum.append(&mut bytes);
        Ok(bytes)
    }
}

/* ───── Incoming frames ────────────────────────────────────────────── */

/// Number of payload bytes that follow a 4-byte header, or a framing error
/// if the header sync bytes are wrong.
pub fn payload_len(header: &[u8]) -> Result<usize, ProtocolError> {
    if header.len() == HEADER_LEN && header[..2] == HEADER {
        Ok(header[3] as usize)
    } else {
        Err(ProtocolError::Framing)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusFrame {
    pub id: u8,
    pub status: DeviceStatus,
    pub params: Vec<u8>,
}

impl StatusFrame {
    /// Parse and validate a complete status frame. A frame that fails any
    /// check is rejected whole; no field of it is interpreted.
    pub fn parse(frame: &[u8], checksum: Checksum) -> Result<Self, ProtocolError> {
        let min_payload = 1 + checksum.width(); // status byte + checksum
        if frame.len() < HEADER_LEN + min_payload || frame[..2] != HEADER {
            return Err(ProtocolError::Framing);
        }
        let payload = frame[3] as usize;
        if payload != frame.len() - HEADER_LEN || payload < min_payload {
            return Err(ProtocolError::Framing);
        }

        checksum.verify(frame)?;

        Ok(StatusFrame {
            id: frame[2],
            status: DeviceStatus(frame[4]),
            params: frame[5..frame.len() - checksum.width()].to_vec(),
        })
    }

    pub fn to_bytes(&self, checksum: Checksum) -> Vec<u8> {
        let len = self.params.len() + 1 + checksum.width();
        let mut bytes = Vec::with_capacity(HEADER_LEN + len);
        bytes.extend_from_slice(&HEADER);
        bytes.push(self.id);
        bytes.push(len as u8);
        bytes.push(self.status.0);
        bytes.extend_from_slice(&self.params);
        checksum.append(&mut bytes);
        bytes
    }
}
