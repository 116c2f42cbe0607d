//! Sinusoidal trajectory demo.
//!
//! Drives a group of STS3215 servos through a sine wave with one sync
//! write per tick, and streams their measured positions back with one
//! sync read. Ctrl-C to stop.

use std::error::Error;
use std::f64::consts::TAU;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;

use servobus::register::sts3215;
use servobus::{Bus, Value};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// serial device, e.g. /dev/ttyACM0
    #[arg(short, long)]
    serialport: String,

    /// baud rate
    #[arg(short, long, default_value_t = 1_000_000)]
    baudrate: u32,

    /// servo ids to drive
    #[arg(short, long, num_args = 1.., default_values_t = [1u8, 2])]
    ids: Vec<u8>,

    /// amplitude in degrees
    #[arg(short, long, default_value_t = 45.0)]
    amplitude: f64,

    /// frequency in Hz
    #[arg(short, long, default_value_t = 0.25)]
    frequency: f64,
}

const TICK: Duration = Duration::from_millis(10);

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut bus = Bus::open(&args.serialport, args.baudrate, TICK)?;

    let torque = sts3215::MAP.get("torque_enable").unwrap();
    let goal = sts3215::MAP.get("goal_position").unwrap();
    let present = sts3215::MAP.get("present_position").unwrap();

    let on: Vec<(u8, Value)> = args.ids.iter().map(|&id| (id, true.into())).collect();
    let _ = bus.sync_write(torque, &on)?;
    log::info!("torque enabled on {:?}", args.ids);

    let amplitude = args.amplitude.to_radians();
    let start = Instant::now();

    loop {
        let t = start.elapsed().as_secs_f64();
        let target = amplitude * (TAU * args.frequency * t).sin();

        let goals: Vec<(u8, Value)> =
            args.ids.iter().map(|&id| (id, target.into())).collect();
        let _ = bus.sync_write(goal, &goals)?;

        match bus.sync_read(present, &args.ids) {
            Ok(positions) => {
                for (id, pos) in &positions {
                    match pos {
                        Ok(Value::Float(rad)) => {
                            println!("t={t:7.3}s  servo {id}: {:8.2} deg", rad.to_degrees())
                        }
                        Ok(other) => println!("t={t:7.3}s  servo {id}: {other:?}"),
                        Err(err) => log::warn!("servo {id}: {err}"),
                    }
                }
            }
            Err(err) => log::warn!("sync read failed: {err}"),
        }

        thread::sleep(TICK);
    }
}
