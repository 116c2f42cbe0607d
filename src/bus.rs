//! The bus controller session.
//!
//! One [`Bus`] exclusively owns one [`Transport`] and issues blocking,
//! strictly sequential transactions on it: the serial line is half-duplex
//! and cannot carry overlapping requests. A call that fails (timeout,
//! protocol error, device fault) leaves the session usable; the input
//! buffer is flushed before every instruction so nothing from a failed
//! call leaks into the next one.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::protocol::{self, Checksum, InstructionFrame, StatusFrame};
use crate::register::{Access, Register, Value};
use crate::transport::{SerialTransport, Transport};

/// Session-wide protocol options, fixed at construction.
#[derive(Debug, Clone, Copy)]
pub struct BusConfig {
    /// Checksum strategy of the protocol variant on this bus.
    pub checksum: Checksum,
    /// Whether devices answer single-register writes with a status frame.
    /// Buses configured with status-return-level 0 suppress them; that is
    /// a configuration, not an error.
    pub status_replies: bool,
    /// Optional settle delay after each transaction, for USB adapters that
    /// need one.
    pub post_delay: Option<Duration>,
}

impl Default for BusConfig {
    fn default() -> Self {
        BusConfig {
            checksum: Checksum::Sum,
            status_replies: true,
            post_delay: None,
        }
    }
}

/// Receipt for a broadcast write.
///
/// A sync write is fire-and-forget: no device acknowledges it, so success
/// only means the transport accepted the frame. This is deliberately a
/// different type from the `()` of a confirmed [`Bus::write_register`] so
/// the weaker guarantee cannot be mistaken for a confirmed one.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a sync write is unconfirmed; only the transport send is known to have succeeded"]
pub struct Unconfirmed {
    /// Device ids addressed, in the ascending order they were serialized.
    pub ids: Vec<u8>,
}

pub struct Bus<T: Transport> {
    transport: T,
    config: BusConfig,
}

impl Bus<SerialTransport> {
    /// Open a serial bus session with default protocol options.
    pub fn open(path: &str, baudrate: u32, timeout: Duration) -> Result<Self> {
        let transport = SerialTransport::open(path, baudrate, timeout)?;
        Ok(Bus::new(transport, BusConfig::default()))
    }
}

impl<T: Transport> Bus<T> {
    pub fn new(transport: T, config: BusConfig) -> Self {
        Bus { transport, config }
    }

    /// Direct access to the underlying transport. Mostly useful for tests
    /// and for reconfiguring the line out-of-band.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Tear down the session, handing the transport back.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Ping one device. `Ok(false)` means it did not answer in time.
    pub fn ping(&mut self, id: u8) -> Result<bool> {
        self.send_instruction(&InstructionFrame::ping(id))?;
        let alive = self.read_status(id).is_ok();
        self.settle();
        Ok(alive)
    }

    /// Read one register from one device, decoded to a physical value.
    pub fn read_register(&mut self, id: u8, register: &Register) -> Result<Value> {
        check_readable(register)?;
        let frame = InstructionFrame::read(id, register.addr, register.width.bytes() as u8);
        self.send_instruction(&frame)?;
        let status = self.read_status(id)?;
        if !status.status.is_ok() {
            return Err(Error::Device {
                id,
                status: status.status,
            });
        }
        let value = register.decode(&status.params)?;
        self.settle();
        Ok(value)
    }

    /// Write one register on one device and wait for its acknowledgment
    /// (unless [`BusConfig::status_replies`] is off).
    ///
    /// Access and range validation happen before any bytes are sent.
    pub fn write_register(&mut self, id: u8, register: &Register, value: Value) -> Result<()> {
        check_writable(register)?;
        let data = register.encode(value)?;
        self.send_instruction(&InstructionFrame::write(id, register.addr, &data))?;
        if self.config.status_replies {
            let status = self.read_status(id)?;
            if !status.status.is_ok() {
                return Err(Error::Device {
                    id,
                    status: status.status,
                });
            }
        }
        self.settle();
        Ok(())
    }

    /// Write one register on a set of devices in a single broadcast frame,
    /// so all of them apply the value on the same control tick.
    ///
    /// Entries are serialized in ascending device id order regardless of
    /// the order given, keeping the wire output reproducible. Access and
    /// range checks run before anything is sent. At-most-once: the frame
    /// is never re-sent by this layer.
    pub fn sync_write(
        &mut self,
        register: &Register,
        entries: &[(u8, Value)],
    ) -> Result<Unconfirmed> {
        check_writable(register)?;
        let mut encoded = entries
            .iter()
            .map(|&(id, value)| Ok((id, register.encode(value)?)))
            .collect::<Result<Vec<_>>>()?;
        encoded.sort_by_key(|&(id, _)| id);
        encoded.dedup_by_key(|&mut (id, _)| id);

        let frame = InstructionFrame::sync_write(
            register.addr,
            register.width.bytes() as u8,
            &encoded,
        );
        self.send_instruction(&frame)?;
        self.settle();
        Ok(Unconfirmed {
            ids: encoded.into_iter().map(|(id, _)| id).collect(),
        })
    }

    /// Read one register from a set of devices with a single broadcast
    /// request, demultiplexing one status frame per device in ascending id
    /// order.
    ///
    /// Partial failures stay partial: a device whose frame fails to
    /// validate gets an error entry in the result while the other devices'
    /// values are still returned. Only a receive timeout or a transport
    /// failure aborts the whole call, since after those nothing more is
    /// coming off the wire.
    pub fn sync_read(
        &mut self,
        register: &Register,
        ids: &[u8],
    ) -> Result<BTreeMap<u8, Result<Value>>> {
        check_readable(register)?;
        let mut sorted = ids.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let frame = InstructionFrame::sync_read(
            register.addr,
            register.width.bytes() as u8,
            &sorted,
        );
        self.send_instruction(&frame)?;

        let mut results = BTreeMap::new();
        for &id in &sorted {
            let entry = match self.read_status(id) {
                Ok(status) if !status.status.is_ok() => Err(Error::Device {
                    id,
                    status: status.status,
                }),
                Ok(status) => register.decode(&status.params).map_err(Error::from),
                Err(err @ (Error::Timeout | Error::Io(_))) => return Err(err),
                Err(err) => Err(err),
            };
            results.insert(id, entry);
        }
        self.settle();
        Ok(results)
    }

    fn send_instruction(&mut self, frame: &InstructionFrame) -> Result<()> {
        let bytes = frame.to_bytes(self.config.checksum)?;
        // An old corrupted response must not be read back as this call's
        // status frame.
        let stale = self.transport.discard_input()?;
        if stale > 0 {
            log::info!("flushed {stale} stale bytes before sending");
        }
        log::debug!(">>> {bytes:02x?}");
        self.transport.send(&bytes)
    }

    fn read_status(&mut self, expected_id: u8) -> Result<StatusFrame> {
        let mut header = [0u8; protocol::HEADER_LEN];
        self.transport.recv_exact(&mut header)?;
        let payload_len = protocol::payload_len(&header)?;

        let mut frame = header.to_vec();
        frame.resize(protocol::HEADER_LEN + payload_len, 0);
        self.transport
            .recv_exact(&mut frame[protocol::HEADER_LEN..])?;
        log::debug!("<<< {frame:02x?}");

        let status = StatusFrame::parse(&frame, self.config.checksum)?;
        if status.id != expected_id {
            return Err(crate::error::ProtocolError::UnexpectedId {
                expected: expected_id,
                got: status.id,
            }
            .into());
        }
        Ok(status)
    }

    fn settle(&self) {
        if let Some(delay) = self.config.post_delay {
            std::thread::sleep(delay);
        }
    }
}

fn check_readable(register: &Register) -> Result<()> {
    if register.access == Access::WriteOnly {
        return Err(Error::Access {
            register: register.name,
            access: register.access,
        });
    }
    Ok(())
}

fn check_writable(register: &Register) -> Result<()> {
    if register.access == Access::ReadOnly {
        return Err(Error::Access {
            register: register.name,
            access: register.access,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DeviceStatus, ProtocolError};
    use crate::register::sts3215;
    use crate::transport::MockTransport;

    fn status(id: u8, faults: u8, params: &[u8]) -> Vec<u8> {
        StatusFrame {
            id,
            status: DeviceStatus(faults),
            params: params.to_vec(),
        }
        .to_bytes(Checksum::Sum)
    }

    fn bus_with(mock: MockTransport) -> Bus<MockTransport> {
        Bus::new(mock, BusConfig::default())
    }

    #[test]
    fn read_register_decodes_value() {
        let mut mock = MockTransport::new();
        // present_position = 2048 ticks -> 0 rad
        mock.queue_reply(&status(1, 0, &[0x00, 0x08]));
        let mut bus = bus_with(mock);

        let reg = sts3215::MAP.get("present_position").unwrap();
        let value = bus.read_register(1, reg).unwrap();
        assert_eq!(value, Value::Float(0.0));
    }

    #[test]
    fn write_register_checks_status_reply() {
        let mut mock = MockTransport::new();
        mock.queue_reply(&status(1, 0, &[]));
        let mut bus = bus_with(mock);

        let reg = sts3215::MAP.get("torque_enable").unwrap();
        bus.write_register(1, reg, Value::Bool(true)).unwrap();
    }

    #[test]
    fn write_register_surfaces_device_fault() {
        let mut mock = MockTransport::new();
        mock.queue_reply(&status(1, 1 << 2, &[])); // overheat bit
        let mut bus = bus_with(mock);

        let reg = sts3215::MAP.get("torque_enable").unwrap();
        let err = bus.write_register(1, reg, Value::Bool(true)).unwrap_err();
        assert!(matches!(err, Error::Device { id: 1, status } if !status.is_ok()));
    }

    #[test]
    fn write_without_status_replies_skips_receive() {
        let mock = MockTransport::new(); // nothing queued: any receive would time out
        let mut bus = Bus::new(
            mock,
            BusConfig {
                status_replies: false,
                ..BusConfig::default()
            },
        );
        let reg = sts3215::MAP.get("goal_position").unwrap();
        bus.write_register(1, reg, Value::Float(0.5)).unwrap();
    }

    #[test]
    fn out_of_range_write_sends_nothing() {
        let mut bus = bus_with(MockTransport::new());
        let reg = sts3215::MAP.get("goal_position").unwrap();

        let err = bus
            .write_register(1, reg, Value::Float(100.0))
            .unwrap_err();
        assert!(matches!(err, Error::Range { register: "goal_position", .. }));
        // zero transport calls were made
        assert!(bus.transport_mut().sent().is_empty());
    }

    #[test]
    fn out_of_range_sync_write_sends_nothing() {
        let mut bus = bus_with(MockTransport::new());
        let reg = sts3215::MAP.get("goal_position").unwrap();

        let err = bus
            .sync_write(reg, &[(1, Value::Float(0.0)), (2, Value::Float(100.0))])
            .unwrap_err();
        assert!(matches!(err, Error::Range { .. }));
        assert!(bus.transport_mut().sent().is_empty());
    }

    #[test]
    fn sync_write_orders_devices_ascending() {
        let reg = sts3215::MAP.get("goal_position").unwrap();
        let v = Value::Float;

        let mut bus = bus_with(MockTransport::new());
        bus.sync_write(reg, &[(3, v(0.1)), (1, v(0.2)), (2, v(0.3))])
            .unwrap();
        let first = bus.transport_mut().take_sent();

        let mut bus = bus_with(MockTransport::new());
        let receipt = bus
            .sync_write(reg, &[(2, v(0.3)), (3, v(0.1)), (1, v(0.2))])
            .unwrap();
        let second = bus.transport_mut().take_sent();

        // byte-identical wire output regardless of input iteration order
        assert_eq!(first, second);
        assert_eq!(receipt.ids, [1, 2, 3]);
    }

    #[test]
    fn sync_read_isolates_a_corrupt_device() {
        let reg = sts3215::MAP.get("present_position").unwrap();

        let mut mock = MockTransport::new();
        mock.queue_reply(&status(1, 0, &[0x00, 0x08]));
        let mut corrupt = status(2, 0, &[0x10, 0x08]);
        let last = corrupt.len() - 2;
        corrupt[last] ^= 0xFF; // flip a param byte: checksum no longer matches
        mock.queue_reply(&corrupt);
        mock.queue_reply(&status(3, 0, &[0x00, 0x09]));

        let mut bus = bus_with(mock);
        let results = bus.sync_read(reg, &[1, 2, 3]).unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[&1].as_ref().unwrap(), &Value::Float(0.0));
        assert!(matches!(
            results[&2],
            Err(Error::Protocol(ProtocolError::ChecksumMismatch { .. }))
        ));
        assert!(results[&3].is_ok());
    }

    #[test]
    fn sync_read_times_out_as_a_whole() {
        let reg = sts3215::MAP.get("present_position").unwrap();
        let mut mock = MockTransport::new();
        mock.queue_reply(&status(1, 0, &[0x00, 0x08]));
        // nothing queued for ids 2 and 3: the bus went silent
        let mut bus = bus_with(mock);

        assert!(matches!(
            bus.sync_read(reg, &[1, 2, 3]),
            Err(Error::Timeout)
        ));
    }

    #[test]
    fn timeout_does_not_poison_the_session() {
        let reg = sts3215::MAP.get("present_position").unwrap();

        // cold session: capture the frame a fresh read sends
        let mut cold = bus_with(MockTransport::new());
        let _ = cold.read_register(1, reg);
        let cold_frames = cold.transport_mut().take_sent();

        // warm session: first read times out, then part of the late reply
        // dribbles into the receive buffer before the next call goes out
        let mut bus = bus_with(MockTransport::new());
        assert!(matches!(bus.read_register(1, reg), Err(Error::Timeout)));
        bus.transport_mut().inject_stale(&[0xFF, 0xFF, 0x01]);
        bus.transport_mut().queue_reply(&status(1, 0, &[0x00, 0x08]));
        // without the pre-send flush this read would parse garbage
        let value = bus.read_register(1, reg).unwrap();
        assert_eq!(value, Value::Float(0.0));

        let frames = bus.transport_mut().take_sent();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1], cold_frames[0]);
    }

    #[test]
    fn write_to_read_only_register_sends_nothing() {
        let mut bus = bus_with(MockTransport::new());
        let reg = sts3215::MAP.get("present_position").unwrap();

        let err = bus.write_register(1, reg, Value::Float(0.0)).unwrap_err();
        assert!(matches!(
            err,
            Error::Access { register: "present_position", access: Access::ReadOnly }
        ));
        assert!(bus.transport_mut().sent().is_empty());

        let err = bus.sync_write(reg, &[(1, Value::Float(0.0))]).unwrap_err();
        assert!(matches!(err, Error::Access { .. }));
        assert!(bus.transport_mut().sent().is_empty());
    }

    #[test]
    fn read_of_write_only_register_sends_nothing() {
        use crate::register::{Encoding, RegWidth};

        // the STS3215 table has no write-only entries, so make one up
        let reg = Register {
            name: "trigger",
            addr: 0x60,
            width: RegWidth::Byte,
            access: Access::WriteOnly,
            encoding: Encoding::Uint,
        };

        let mut bus = bus_with(MockTransport::new());
        let err = bus.read_register(1, &reg).unwrap_err();
        assert!(matches!(
            err,
            Error::Access { register: "trigger", access: Access::WriteOnly }
        ));
        assert!(bus.transport_mut().sent().is_empty());

        let err = bus.sync_read(&reg, &[1, 2]).unwrap_err();
        assert!(matches!(err, Error::Access { .. }));
        assert!(bus.transport_mut().sent().is_empty());
    }

    #[test]
    fn oversize_sync_write_is_rejected_whole() {
        let mut bus = bus_with(MockTransport::new());
        let reg = sts3215::MAP.get("goal_position").unwrap();

        // 120 two-byte entries overflow the 250-byte frame limit
        let entries: Vec<(u8, Value)> =
            (1u8..=120).map(|id| (id, Value::Float(0.0))).collect();
        let err = bus.sync_write(reg, &entries).unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::FrameTooLong { .. })
        ));
        assert!(bus.transport_mut().sent().is_empty());
    }

    #[test]
    fn ping_silent_device_is_false() {
        let mut bus = bus_with(MockTransport::new());
        assert!(!bus.ping(9).unwrap());

        let mut mock = MockTransport::new();
        mock.queue_reply(&status(9, 0, &[]));
        let mut bus = bus_with(mock);
        assert!(bus.ping(9).unwrap());
    }

    #[test]
    fn mismatched_status_id_is_protocol_error() {
        let reg = sts3215::MAP.get("present_position").unwrap();
        let mut mock = MockTransport::new();
        mock.queue_reply(&status(5, 0, &[0x00, 0x08]));
        let mut bus = bus_with(mock);

        assert!(matches!(
            bus.read_register(1, reg),
            Err(Error::Protocol(ProtocolError::UnexpectedId {
                expected: 1,
                got: 5
            }))
        ));
    }
}
