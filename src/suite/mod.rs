//! Workload Suites
//!
//! Definition and loading of the ordered list of workload units a
//! harness run executes.
//!
//! - [`model`]: [`Suite`] and [`WorkloadUnit`] data structures
//! - [`parser`]: YAML loading and validation

pub mod model;
pub mod parser;

pub use model::{Suite, WorkloadUnit};
pub use parser::load_suite;
