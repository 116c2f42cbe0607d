//! Register maps: the data table that describes one servo family's memory
//! layout, plus value encoding between physical units and raw wire bytes.
//!
//! A [`Register`] carries everything the bus controller needs to build a
//! transaction: address, width, access mode and encoding. Raw wire integers
//! never cross the public API; callers deal in [`Value`]s.

use crate::error::{Error, ProtocolError, Result};

pub mod sts3215;

/// Width of a register in the device memory map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegWidth {
    Byte,
    Word,
    DWord,
}

impl RegWidth {
    pub fn bytes(self) -> usize {
        match self {
            RegWidth::Byte => 1,
            RegWidth::Word => 2,
            RegWidth::DWord => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

/// How raw register bits map to a physical value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Encoding {
    /// Raw unsigned integer.
    Uint,
    /// Raw two's-complement signed integer.
    Int,
    /// 0 = false, anything else = true.
    Bool,
    /// Position in radians. `zero` is the tick count reported at 0 rad;
    /// valid raw values span one turn, `0..ticks_per_turn`.
    Angle { ticks_per_turn: u32, zero: u32 },
}

/// Physical-unit value read from or written to a register.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl Value {
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_i64(self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_f64(self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(f),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

/// One named, fixed-width location in a device memory map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Register {
    pub name: &'static str,
    pub addr: u8,
    pub width: RegWidth,
    pub access: Access,
    pub encoding: Encoding,
}

impl Register {
    /// Encode a physical value into little-endian wire bytes.
    ///
    /// Fails with [`Error::Range`] if the value does not fit the register's
    /// representable domain; nothing has touched the bus at that point.
    pub fn encode(&self, value: Value) -> Result<Vec<u8>> {
        let out_of_range = || Error::Range {
            register: self.name,
            value,
        };

        let raw: u32 = match (self.encoding, value) {
            (Encoding::Bool, Value::Bool(b)) => b as u32,
            (Encoding::Uint, Value::Int(i)) => {
                let max = self.max_unsigned();
                if i < 0 || i as u64 > max {
                    return Err(out_of_range());
                }
                i as u32
            }
            (Encoding::Int, Value::Int(i)) => {
                let half = 1i64 << (self.width.bytes() * 8 - 1);
                if i < -half || i >= half {
                    return Err(out_of_range());
                }
                // two's complement truncated to the register width
                (i as u32) & (self.max_unsigned() as u32)
            }
            (Encoding::Angle { ticks_per_turn, zero }, Value::Float(rad)) => {
                if !rad.is_finite() {
                    return Err(out_of_range());
                }
                let ticks = (zero as f64
                    + rad * ticks_per_turn as f64 / std::f64::consts::TAU)
                    .round();
                if ticks < 0.0 || ticks >= ticks_per_turn as f64 {
                    return Err(out_of_range());
                }
                ticks as u32
            }
            _ => return Err(out_of_range()),
        };

        Ok(raw.to_le_bytes()[..self.width.bytes()].to_vec())
    }

    /// Decode wire bytes into a physical value. A payload of the wrong
    /// length is a framing-level failure, not a value.
    pub fn decode(&self, bytes: &[u8]) -> Result<Value, ProtocolError> {
        if bytes.len() != self.width.bytes() {
            return Err(ProtocolError::Framing);
        }
        let mut le = [0u8; 4];
        le[..bytes.len()].copy_from_slice(bytes);
        let raw = u32::from_le_bytes(le);

        Ok(match self.encoding {
            Encoding::Bool => Value::Bool(raw != 0),
            Encoding::Uint => Value::Int(raw as i64),
            Encoding::Int => {
                let bits = self.width.bytes() * 8;
                let shift = 32 - bits;
                Value::Int(((raw << shift) as i32 >> shift) as i64)
            }
            Encoding::Angle { ticks_per_turn, zero } => Value::Float(
                (raw as f64 - zero as f64) * std::f64::consts::TAU / ticks_per_turn as f64,
            ),
        })
    }

    fn max_unsigned(&self) -> u64 {
        (1u64 << (self.width.bytes() * 8)) - 1
    }
}

/// A servo family's register table, supplied as static configuration.
#[derive(Debug, Clone, Copy)]
pub struct RegisterMap {
    pub family: &'static str,
    registers: &'static [Register],
}

impl RegisterMap {
    pub const fn new(family: &'static str, registers: &'static [Register]) -> Self {
        RegisterMap { family, registers }
    }

    pub fn get(&self, name: &str) -> Option<&'static Register> {
        self.registers.iter().find(|r| r.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static Register> {
        self.registers.iter()
    }
}
