//! Session Reports
//!
//! Data captured for one harness run: per-workload run records plus the
//! cumulative meter reading obtained when the session was stopped.
//!
//! A [`SessionReport`] is produced once per session, is read-only after
//! construction, and can be persisted as JSON for later inspection.

use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;
use std::process::ExitStatus;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::metering::Reading;

/// Outcome of a terminated child process.
///
/// Preserves the OS exit code where one exists. On Unix a process killed
/// by a signal has no exit code; that case is kept distinct rather than
/// being collapsed into an arbitrary numeric value.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitInfo {
    /// Process exited normally with the given code.
    Code(i32),
    /// Process was terminated without an exit code (e.g. by a signal).
    Signal,
}

impl ExitInfo {
    /// Converts a standard library exit status.
    pub fn from_status(status: ExitStatus) -> Self {
        match status.code() {
            Some(code) => ExitInfo::Code(code),
            None => ExitInfo::Signal,
        }
    }

    /// Returns true if the process exited with code 0.
    pub fn success(&self) -> bool {
        matches!(self, ExitInfo::Code(0))
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitInfo::Code(code) => write!(f, "exit code {}", code),
            ExitInfo::Signal => write!(f, "termination by signal"),
        }
    }
}

/// Timing and outcome data for one workload unit's execution.
///
/// Created the moment the unit's child process is launched and finalized
/// when it terminates; immutable thereafter.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RunRecord {
    /// Name of the workload unit
    pub unit: String,

    /// Wall-clock timestamp at launch
    pub started_at: DateTime<Utc>,

    /// Time from launch to termination
    pub duration: Duration,

    /// How the child process exited
    pub status: ExitInfo,
}

/// Ordered run records plus the final cumulative reading for one session.
///
/// `reading` is `None` only when the sensor failed to stop; the records
/// gathered up to that point are still exposed.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SessionReport {
    /// One record per executed workload, in execution order
    pub records: Vec<RunRecord>,

    /// Cumulative meter reading, if the session stopped cleanly
    pub reading: Option<Reading>,
}

impl SessionReport {
    /// Creates a report from records and an optional reading.
    pub fn new(records: Vec<RunRecord>, reading: Option<Reading>) -> Self {
        Self { records, reading }
    }

    /// Returns true if every recorded workload exited successfully.
    ///
    /// An empty report counts as successful.
    pub fn all_succeeded(&self) -> bool {
        self.records.iter().all(|r| r.status.success())
    }

    /// Names of workloads that exited abnormally, in execution order.
    pub fn failed_units(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| !r.status.success())
            .map(|r| r.unit.as_str())
            .collect()
    }

    /// Sum of all recorded workload durations.
    pub fn total_duration(&self) -> Duration {
        self.records.iter().map(|r| r.duration).sum()
    }

    /// Writes the report as pretty-printed JSON.
    ///
    /// Parent directories are created if missing.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn Error>> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;

        info!("Saved session report to {}", path.display());
        Ok(())
    }

    /// Returns a human-readable summary of the session.
    pub fn summary(&self) -> String {
        let mut output = String::from("Session Report:\n");

        if self.records.is_empty() {
            output.push_str("  No workloads executed\n");
        }

        for record in &self.records {
            let outcome = if record.status.success() {
                "ok".to_string()
            } else {
                record.status.to_string()
            };
            output.push_str(&format!(
                "  {:<24} {:>8.2}s  {}\n",
                record.unit,
                record.duration.as_secs_f64(),
                outcome
            ));
        }

        match &self.reading {
            Some(reading) => {
                output.push_str(&format!(
                    "  Measured interval: {:.2}s\n",
                    reading.duration.as_secs_f64()
                ));
                output.push_str(&format!("  Energy: {:.6} kWh\n", reading.energy_kwh));
                output.push_str(&format!(
                    "  Total emissions: {:.6} kg CO2",
                    reading.emissions_kg
                ));
            }
            None => {
                output.push_str("  Reading unavailable (sensor stop failed)");
            }
        }

        output
    }
}
