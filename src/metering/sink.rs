//! Emissions Sink
//!
//! Flat, append-only CSV store for completed metering sessions: one row
//! per session, existing files extended rather than replaced. Finer
//! per-sample detail is deliberately left to the sensor side; the sink
//! records only the cumulative figures.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::debug;
use once_cell::sync::Lazy;

use super::sensor::Reading;

/// CSV header written once when a sink file is created.
const SINK_HEADER: &str = "timestamp,project,duration_secs,energy_kwh,emissions_kg";

/// Lazily-resolved default sink path.
///
/// The `CARBONRUN_OUTPUT` environment variable takes priority; otherwise
/// rows land in `results/emissions.csv` under the current directory.
pub static DEFAULT_SINK_PATH: Lazy<PathBuf> = Lazy::new(|| {
    if let Ok(path) = std::env::var("CARBONRUN_OUTPUT") {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    PathBuf::from("results").join("emissions.csv")
});

/// Append-only record store for session readings.
#[derive(Debug, Clone)]
pub struct EmissionsSink {
    path: PathBuf,
}

impl EmissionsSink {
    /// Creates a sink targeting the given path. Nothing is written
    /// until the first `append`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the sink's target path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one session row, creating the file (and its parent
    /// directories) on first use. The header is written only when the
    /// file is new or empty.
    pub fn append(
        &self,
        project: &str,
        started_at: DateTime<Utc>,
        reading: &Reading,
    ) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let needs_header = match fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if needs_header {
            writeln!(file, "{}", SINK_HEADER)?;
        }

        writeln!(
            file,
            "{},{},{:.2},{:.6},{:.6}",
            started_at.to_rfc3339(),
            project,
            reading.duration.as_secs_f64(),
            reading.energy_kwh,
            reading.emissions_kg
        )?;

        debug!("Appended session row to {}", self.path.display());
        Ok(())
    }
}
