//! Register table for the STS3215 servo family (SO-100 / SO-101 arm joints).
//!
//! Addresses follow the vendor memory map: EEPROM configuration below 26,
//! SRAM control from 40, telemetry from 56. Positions are 12-bit, 4096
//! ticks per turn with the mechanical zero at tick 2048.

use super::{Access, Encoding, Register, RegisterMap, RegWidth};

pub const TICKS_PER_TURN: u32 = 4096;
pub const ZERO_TICK: u32 = 2048;

const ANGLE: Encoding = Encoding::Angle {
    ticks_per_turn: TICKS_PER_TURN,
    zero: ZERO_TICK,
};

macro_rules! reg {
    ($name:literal, $addr:literal, $width:ident, $access:ident, $encoding:expr) => {
        Register {
            name: $name,
            addr: $addr,
            width: RegWidth::$width,
            access: Access::$access,
            encoding: $encoding,
        }
    };
}

pub static REGISTERS: &[Register] = &[
    /* EEPROM */
    reg!("model", 3, Word, ReadOnly, Encoding::Uint),
    reg!("id", 5, Byte, ReadWrite, Encoding::Uint),
    reg!("baudrate", 6, Byte, ReadWrite, Encoding::Uint),
    reg!("return_delay", 7, Byte, ReadWrite, Encoding::Uint),
    reg!("status_return_level", 8, Byte, ReadWrite, Encoding::Uint),
    reg!("min_angle_limit", 9, Word, ReadWrite, ANGLE),
    reg!("max_angle_limit", 11, Word, ReadWrite, ANGLE),
    reg!("temperature_limit", 13, Byte, ReadWrite, Encoding::Uint),
    reg!("max_torque_limit", 16, Word, ReadWrite, Encoding::Uint),
    reg!("kp", 21, Byte, ReadWrite, Encoding::Uint),
    reg!("kd", 22, Byte, ReadWrite, Encoding::Uint),
    reg!("ki", 23, Byte, ReadWrite, Encoding::Uint),
    /* SRAM control */
    reg!("torque_enable", 40, Byte, ReadWrite, Encoding::Bool),
    reg!("acceleration", 41, Byte, ReadWrite, Encoding::Uint),
    reg!("goal_position", 42, Word, ReadWrite, ANGLE),
    reg!("goal_time", 44, Word, ReadWrite, Encoding::Uint),
    reg!("goal_speed", 46, Word, ReadWrite, Encoding::Int),
    reg!("lock", 55, Byte, ReadWrite, Encoding::Bool),
    /* telemetry */
    reg!("present_position", 56, Word, ReadOnly, ANGLE),
    reg!("present_speed", 58, Word, ReadOnly, Encoding::Int),
    reg!("present_load", 60, Word, ReadOnly, Encoding::Int),
    reg!("present_voltage", 62, Byte, ReadOnly, Encoding::Uint),
    reg!("present_temperature", 63, Byte, ReadOnly, Encoding::Uint),
    reg!("status", 65, Byte, ReadOnly, Encoding::Uint),
    reg!("moving", 66, Byte, ReadOnly, Encoding::Bool),
    reg!("present_current", 69, Word, ReadOnly, Encoding::Uint),
];

pub static MAP: RegisterMap = RegisterMap::new("sts3215", REGISTERS);
