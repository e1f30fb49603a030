//! Process Boundary
//!
//! Workloads run as isolated child processes, never as in-process
//! function calls: a crashing or resource-exhausting workload cannot
//! corrupt the harness's own state. The [`Launcher`] / [`ProcessHandle`]
//! seam makes that boundary explicit and lets tests substitute a spy
//! launcher without spawning real processes.

use std::io;
use std::path::PathBuf;
use std::process::{Child, Command};

use log::debug;

use crate::report::ExitInfo;
use crate::suite::model::WorkloadUnit;

/// A launched child process that can be waited on.
pub trait ProcessHandle {
    /// Blocks until the process terminates and returns how it exited.
    fn wait(&mut self) -> io::Result<ExitInfo>;
}

/// Launches workload units as child processes.
pub trait Launcher {
    type Handle: ProcessHandle;

    /// Starts the unit's program. Does not wait for termination.
    fn launch(&self, unit: &WorkloadUnit) -> io::Result<Self::Handle>;
}

/// Production launcher backed by `std::process::Command`.
///
/// Child stdout/stderr are inherited; the harness communicates with a
/// workload only via its exit status and wall-clock timing.
#[derive(Debug, Default)]
pub struct OsLauncher {
    working_dir: Option<PathBuf>,
}

impl OsLauncher {
    /// Creates a launcher running units in the current directory.
    pub fn new() -> Self {
        Self { working_dir: None }
    }

    /// Sets the working directory for launched units.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

impl Launcher for OsLauncher {
    type Handle = OsProcess;

    fn launch(&self, unit: &WorkloadUnit) -> io::Result<OsProcess> {
        let mut cmd = Command::new(&unit.command);
        cmd.args(&unit.args);

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
            debug!("Launching '{}' in directory: {}", unit.name, dir.display());
        }

        let child = cmd.spawn()?;
        debug!("Launched '{}' (pid {})", unit.name, child.id());

        Ok(OsProcess { child })
    }
}

/// Handle to a spawned OS child process.
pub struct OsProcess {
    child: Child,
}

impl ProcessHandle for OsProcess {
    fn wait(&mut self) -> io::Result<ExitInfo> {
        let status = self.child.wait()?;
        Ok(ExitInfo::from_status(status))
    }
}
