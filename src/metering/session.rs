//! Metering Sessions
//!
//! A [`MeteringSession`] is a bounded interval during which a sensor
//! accumulates a resource/energy reading. Starting a session begins
//! sensor sampling; stopping it flushes one row to the emissions sink
//! and returns the cumulative [`Reading`].
//!
//! The underlying sensor is process-wide, so exactly one session may be
//! active at a time and stop must run exactly once per start. Both
//! rules are enforced structurally: `start` returns the sole handle and
//! `stop` consumes it, making double-stop unrepresentable. If a session
//! is dropped without an explicit stop (a panic path), the sensor is
//! still shut down, but no row is flushed and the reading is discarded.

use chrono::{DateTime, Utc};
use log::{info, warn};

use super::sensor::{MeterError, Reading, Sensor};
use super::sink::EmissionsSink;

/// A running metering session.
///
/// Created by [`MeteringSession::start`]; finalized exactly once by
/// [`MeteringSession::stop`]. The handle is passed explicitly to
/// whatever scope drives the session rather than living in ambient
/// global state, so sequential sessions never leak into each other.
pub struct MeteringSession {
    label: String,
    sink: EmissionsSink,
    sensor: Option<Box<dyn Sensor>>,
    started_at: DateTime<Utc>,
}

impl MeteringSession {
    /// Starts a session: begins sensor sampling. Writes nothing yet.
    ///
    /// Fails if the sensor cannot begin accumulating; in that case no
    /// session exists and nothing needs finalizing.
    pub fn start(
        label: impl Into<String>,
        sink: EmissionsSink,
        mut sensor: Box<dyn Sensor>,
    ) -> Result<Self, MeterError> {
        let label = label.into();
        sensor.begin()?;

        info!("Metering session '{}' started", label);

        Ok(Self {
            label,
            sink,
            sensor: Some(sensor),
            started_at: Utc::now(),
        })
    }

    /// The project label this session was started with.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The wall-clock timestamp at which the session started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Stops the session: ends sensor accumulation, appends one row to
    /// the sink, and returns the cumulative reading.
    ///
    /// Consumes the session, so it cannot be stopped twice. A sensor or
    /// sink failure is surfaced to the caller, never masked.
    pub fn stop(mut self) -> Result<Reading, MeterError> {
        let mut sensor = self.sensor.take().ok_or(MeterError::SensorIdle)?;
        let reading = sensor.end()?;

        self.sink.append(&self.label, self.started_at, &reading)?;

        info!(
            "Metering session '{}' stopped ({:.6} kg CO2)",
            self.label, reading.emissions_kg
        );

        Ok(reading)
    }
}

impl Drop for MeteringSession {
    fn drop(&mut self) {
        // Backstop for panic/early-drop paths: shut the sensor down
        // without flushing. Normal exits go through stop(), which has
        // already taken the sensor.
        if let Some(mut sensor) = self.sensor.take() {
            warn!(
                "Metering session '{}' dropped without stop - reading discarded",
                self.label
            );
            let _ = sensor.end();
        }
    }
}
