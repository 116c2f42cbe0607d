//! Register-level controller for SCS/STS serial bus servos.
//!
//! A [`Bus`] session owns one half-duplex serial line and addresses the
//! servos attached to it by device id: single-register reads and writes,
//! plus synchronized multi-device access (`sync_write` / `sync_read`) so a
//! whole group of actuators receives its goal, and reports its telemetry,
//! on the same control tick.
//!
//! Register layouts are data, not code: a [`register::RegisterMap`] table
//! names each register's address, width, access mode and physical encoding,
//! and the built-in [`register::sts3215`] table covers the STS3215 family.
//! Values cross the API in physical units (radians, booleans, integers);
//! raw wire ticks stay internal.
//!
//! ```no_run
//! use std::time::Duration;
//! use servobus::{register::sts3215, Bus};
//!
//! # fn main() -> servobus::Result<()> {
//! let mut bus = Bus::open("/dev/ttyACM0", 1_000_000, Duration::from_millis(10))?;
//!
//! let torque = sts3215::MAP.get("torque_enable").unwrap();
//! let goal = sts3215::MAP.get("goal_position").unwrap();
//! let present = sts3215::MAP.get("present_position").unwrap();
//!
//! let _ = bus.sync_write(torque, &[(1, true.into()), (2, true.into())])?;
//! let _ = bus.sync_write(goal, &[(1, 0.0f64.into()), (2, 0.0f64.into())])?;
//! for (id, pos) in bus.sync_read(present, &[1, 2])? {
//!     println!("servo {id}: {pos:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod bus;
pub mod error;
pub mod protocol;
pub mod register;
pub mod transport;

pub use bus::{Bus, BusConfig, Unconfirmed};
pub use error::{DeviceFault, DeviceStatus, Error, ProtocolError, Result};
pub use register::{Register, RegisterMap, Value};
pub use transport::{SerialTransport, Transport};
