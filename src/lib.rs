//! carbonrun - Sequential Workload Harness with Energy Metering
//!
//! Runs a fixed, ordered sequence of opaque workload programs as child
//! processes, measures the energy/emissions cost of the whole run via a
//! metering session, and aggregates a cumulative report even when
//! individual workloads fail.
//!
//! # Architecture
//!
//! The library is organized into four main modules:
//!
//! - [`suite`]: Data structures and parsing for workload suite definitions
//! - [`execution`]: Sequential runner and the process-boundary abstraction
//! - [`metering`]: Sensor, session lifecycle and the emissions sink
//! - [`report`]: Run records and the aggregated session report
//!
//! # Example
//!
//! ```rust,no_run
//! use carbonrun::execution::WorkloadRunner;
//! use carbonrun::metering::{CpuEnergySensor, EmissionsSink};
//! use carbonrun::load_suite;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Load a suite from YAML
//!     let suite = load_suite("suite.yaml")?;
//!
//!     // Run every unit under one metering session
//!     let runner = WorkloadRunner::new();
//!     let report = runner.run(
//!         &suite.units,
//!         &suite.project,
//!         EmissionsSink::new("results/emissions.csv"),
//!         Box::new(CpuEnergySensor::new()),
//!     )?;
//!
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

pub mod execution;
pub mod metering;
pub mod report;
pub mod suite;

// Re-export commonly used types
pub use execution::runner::{RunError, WorkloadRunner};
pub use metering::session::MeteringSession;
pub use report::{RunRecord, SessionReport};
pub use suite::model::{Suite, WorkloadUnit};
pub use suite::parser::load_suite;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "carbonrun";
