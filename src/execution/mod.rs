//! Workload Execution
//!
//! Sequential execution of workload units under one metering session.
//!
//! - [`process`]: the process-boundary abstraction ([`Launcher`] /
//!   [`ProcessHandle`]) keeping workloads isolated in child processes
//! - [`runner`]: [`WorkloadRunner`] sequencing, timing, failure
//!   isolation and report aggregation

pub mod process;
pub mod runner;

pub use process::{Launcher, OsLauncher, ProcessHandle};
pub use runner::{RunError, WorkloadRunner};
