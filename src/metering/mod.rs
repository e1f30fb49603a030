//! Energy Metering
//!
//! Resource/energy accounting for a harness run:
//!
//! - [`Sensor`]: start/stop contract for a cumulative usage sensor
//! - [`CpuEnergySensor`]: default sensor backed by CPU load sampling
//! - [`EmissionsSink`]: flat append-only CSV store, one row per session
//! - [`MeteringSession`]: scoped session tying a sensor to a sink

pub mod sensor;
pub mod session;
pub mod sink;

pub use sensor::{CpuEnergySensor, MeterError, Reading, Sensor};
pub use session::MeteringSession;
pub use sink::{EmissionsSink, DEFAULT_SINK_PATH};
