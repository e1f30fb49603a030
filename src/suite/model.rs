//! Suite Data Model
//!
//! Core data structures describing a workload suite: an ordered list of
//! opaque, externally-supplied programs to run under one metering session.
//!
//! # Example YAML Format
//!
//! ```yaml
//! project: full_suite
//! output_file: results/emissions.csv
//! units:
//!   - name: data_processing
//!     command: python
//!     args: [programs/data_processing.py]
//!
//!   - name: matrix_operations
//!     command: python
//!     args: [programs/matrix_operations.py]
//! ```

use serde::{Deserialize, Serialize};

/// One externally-supplied workload: a program to run as a child process.
///
/// The harness sees nothing of the unit's internals; it communicates
/// only via the exit status and wall-clock timing. Units are immutable
/// once the suite is built.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WorkloadUnit {
    /// Unique identifier for this unit
    pub name: String,

    /// Executable to invoke (path or command resolved via PATH)
    pub command: String,

    /// Arguments passed to the executable
    #[serde(default)]
    pub args: Vec<String>,
}

impl WorkloadUnit {
    /// Creates a new workload unit.
    ///
    /// # Example
    ///
    /// ```
    /// use carbonrun::suite::WorkloadUnit;
    ///
    /// let unit = WorkloadUnit::new("data_processing", "python")
    ///     .with_arg("programs/data_processing.py");
    /// ```
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            command: command.into().trim().to_string(),
            args: Vec::new(),
        }
    }

    /// Appends a single argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Replaces the argument list.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

/// An ordered suite of workload units plus run-level configuration.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Suite {
    /// Project label recorded with the session's emissions row
    #[serde(default = "default_project")]
    pub project: String,

    /// Optional override for the emissions sink path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,

    /// Units to execute, in order
    #[serde(default)]
    pub units: Vec<WorkloadUnit>,
}

/// Default project label for suites that don't specify one.
fn default_project() -> String {
    "full_suite".to_string()
}

impl Suite {
    /// Creates an empty suite with the given project label.
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            output_file: None,
            units: Vec::new(),
        }
    }

    /// Appends a unit to the run list.
    pub fn add_unit(&mut self, unit: WorkloadUnit) {
        self.units.push(unit);
    }

    /// Returns true if the suite has no units.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Number of units in the suite.
    pub fn len(&self) -> usize {
        self.units.len()
    }
}

impl Default for Suite {
    fn default() -> Self {
        Self::new(default_project())
    }
}
