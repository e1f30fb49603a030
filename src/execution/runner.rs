//! Workload Runner
//!
//! Executes an ordered list of workload units, one at a time, each as an
//! isolated child process, under one metering session:
//!
//! 1. The session is started before any unit launches.
//! 2. Units run strictly sequentially in input order; the runner never
//!    has more than one child outstanding.
//! 3. Per unit, a [`RunRecord`] captures the launch timestamp, the
//!    wall-clock duration, and the exit status.
//! 4. The session is stopped exactly once on every exit path; a failing
//!    unit halts subsequent units but never skips finalization, and the
//!    partial report travels with the error.
//!
//! No unit is retried and no timeout is enforced; a workload that never
//! terminates blocks the runner indefinitely.

use std::time::Instant;

use chrono::Utc;
use log::{error, info};
use thiserror::Error;

use crate::metering::{MeterError, MeteringSession, Sensor};
use crate::metering::sink::EmissionsSink;
use crate::report::{ExitInfo, RunRecord, SessionReport};
use crate::suite::model::WorkloadUnit;

use super::process::{Launcher, OsLauncher, ProcessHandle};

/// Errors from one harness run.
///
/// Every variant raised after the session started carries the report
/// gathered up to the failure point; results already measured are never
/// discarded. When the sensor also failed to stop while a workload
/// failure was propagating, the workload failure stays primary and the
/// stop failure rides along as secondary detail.
#[derive(Debug, Error)]
pub enum RunError {
    /// The sensor could not begin sampling; no unit was executed.
    #[error("sensor failed to start: {0}")]
    SensorStart(#[source] MeterError),

    /// A unit's child process could not be spawned or waited on.
    #[error("failed to launch workload '{unit}': {source}")]
    Launch {
        unit: String,
        source: std::io::Error,
        report: SessionReport,
        stop_failure: Option<MeterError>,
    },

    /// A unit's child process terminated abnormally.
    #[error("workload '{unit}' failed with {status}")]
    WorkloadFailed {
        unit: String,
        status: ExitInfo,
        report: SessionReport,
        stop_failure: Option<MeterError>,
    },

    /// The sensor failed to finalize on an otherwise successful run.
    #[error("sensor failed to stop: {source}")]
    SensorStop {
        source: MeterError,
        report: SessionReport,
    },
}

impl RunError {
    /// Partial report gathered before the failure, if the session had
    /// already started.
    pub fn report(&self) -> Option<&SessionReport> {
        match self {
            RunError::SensorStart(_) => None,
            RunError::Launch { report, .. }
            | RunError::WorkloadFailed { report, .. }
            | RunError::SensorStop { report, .. } => Some(report),
        }
    }

    /// Secondary sensor-stop failure attached to a workload failure.
    pub fn stop_failure(&self) -> Option<&MeterError> {
        match self {
            RunError::Launch { stop_failure, .. }
            | RunError::WorkloadFailed { stop_failure, .. } => stop_failure.as_ref(),
            _ => None,
        }
    }
}

/// Why the sequential loop halted early.
enum Halt {
    Workload { unit: String, status: ExitInfo },
    Launch { unit: String, source: std::io::Error },
}

/// Sequential workload executor.
///
/// # Example
///
/// ```rust,no_run
/// use carbonrun::execution::WorkloadRunner;
/// use carbonrun::metering::{CpuEnergySensor, EmissionsSink};
/// use carbonrun::suite::load_suite;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let suite = load_suite("suite.yaml")?;
///     let runner = WorkloadRunner::new();
///
///     let report = runner.run(
///         &suite.units,
///         &suite.project,
///         EmissionsSink::new("results/emissions.csv"),
///         Box::new(CpuEnergySensor::new()),
///     )?;
///
///     println!("{}", report.summary());
///     Ok(())
/// }
/// ```
pub struct WorkloadRunner<L: Launcher = OsLauncher> {
    launcher: L,
    continue_on_failure: bool,
}

impl WorkloadRunner<OsLauncher> {
    /// Creates a runner launching real OS child processes.
    pub fn new() -> Self {
        Self::with_launcher(OsLauncher::new())
    }
}

impl Default for WorkloadRunner<OsLauncher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Launcher> WorkloadRunner<L> {
    /// Creates a runner over a custom launcher (tests substitute a spy).
    pub fn with_launcher(launcher: L) -> Self {
        Self {
            launcher,
            continue_on_failure: false,
        }
    }

    /// When set, a failing unit is recorded and subsequent units still
    /// run; the default is to halt at the first failure.
    pub fn set_continue_on_failure(&mut self, continue_on_failure: bool) {
        self.continue_on_failure = continue_on_failure;
    }

    /// Starts a metering session and runs the units under it.
    ///
    /// Convenience wrapper around [`MeteringSession::start`] and
    /// [`WorkloadRunner::run_with_session`].
    pub fn run(
        &self,
        units: &[WorkloadUnit],
        label: &str,
        sink: EmissionsSink,
        sensor: Box<dyn Sensor>,
    ) -> Result<SessionReport, RunError> {
        let session =
            MeteringSession::start(label, sink, sensor).map_err(RunError::SensorStart)?;
        self.run_with_session(units, session)
    }

    /// Runs the units under an already-started session.
    ///
    /// The session is stopped exactly once on every path out of this
    /// function. Unit failures are captured as values rather than
    /// propagated with `?`, so control always reaches the stop call;
    /// the session's own Drop covers the panic path.
    pub fn run_with_session(
        &self,
        units: &[WorkloadUnit],
        session: MeteringSession,
    ) -> Result<SessionReport, RunError> {
        let mut records = Vec::with_capacity(units.len());

        let halt = self.execute_all(units, &mut records);
        let stopped = session.stop();

        match (halt, stopped) {
            (None, Ok(reading)) => Ok(SessionReport::new(records, Some(reading))),
            (None, Err(source)) => Err(RunError::SensorStop {
                source,
                report: SessionReport::new(records, None),
            }),
            (Some(halt), stopped) => {
                let (reading, stop_failure) = match stopped {
                    Ok(reading) => (Some(reading), None),
                    Err(e) => (None, Some(e)),
                };
                let report = SessionReport::new(records, reading);

                Err(match halt {
                    Halt::Workload { unit, status } => RunError::WorkloadFailed {
                        unit,
                        status,
                        report,
                        stop_failure,
                    },
                    Halt::Launch { unit, source } => RunError::Launch {
                        unit,
                        source,
                        report,
                        stop_failure,
                    },
                })
            }
        }
    }

    /// Runs units in order, one child outstanding at a time.
    ///
    /// Returns the halting failure, if any. Must not return early via
    /// `?`: the caller's session stop depends on this function always
    /// returning normally.
    fn execute_all(
        &self,
        units: &[WorkloadUnit],
        records: &mut Vec<RunRecord>,
    ) -> Option<Halt> {
        for unit in units {
            info!("Running {}...", unit.name);

            let started_at = Utc::now();
            let clock = Instant::now();

            let mut handle = match self.launcher.launch(unit) {
                Ok(handle) => handle,
                Err(source) => {
                    error!("Failed to launch '{}': {}", unit.name, source);
                    return Some(Halt::Launch {
                        unit: unit.name.clone(),
                        source,
                    });
                }
            };

            let status = match handle.wait() {
                Ok(status) => status,
                Err(source) => {
                    error!("Failed waiting on '{}': {}", unit.name, source);
                    return Some(Halt::Launch {
                        unit: unit.name.clone(),
                        source,
                    });
                }
            };

            let duration = clock.elapsed();

            records.push(RunRecord {
                unit: unit.name.clone(),
                started_at,
                duration,
                status,
            });

            if status.success() {
                info!(
                    "Completed {} in {:.2} seconds",
                    unit.name,
                    duration.as_secs_f64()
                );
            } else {
                error!("Workload '{}' failed with {}", unit.name, status);

                if !self.continue_on_failure {
                    return Some(Halt::Workload {
                        unit: unit.name.clone(),
                        status,
                    });
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metering::Reading;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    /// What the spy launcher should do for one unit.
    #[derive(Clone)]
    enum Script {
        Exit(i32),
        SleepThenExit(Duration, i32),
        RefuseToLaunch,
    }

    /// Launcher that records launch order and plays back scripted
    /// outcomes instead of spawning real processes.
    struct SpyLauncher {
        scripts: Mutex<std::collections::HashMap<String, Script>>,
        launched: Arc<Mutex<Vec<String>>>,
    }

    impl SpyLauncher {
        fn new() -> Self {
            Self {
                scripts: Mutex::new(std::collections::HashMap::new()),
                launched: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn script(self, unit: &str, script: Script) -> Self {
            self.scripts.lock().unwrap().insert(unit.to_string(), script);
            self
        }

        fn launched(&self) -> Arc<Mutex<Vec<String>>> {
            Arc::clone(&self.launched)
        }
    }

    struct ScriptedProcess {
        script: Script,
    }

    impl ProcessHandle for ScriptedProcess {
        fn wait(&mut self) -> io::Result<ExitInfo> {
            match &self.script {
                Script::Exit(code) => Ok(ExitInfo::Code(*code)),
                Script::SleepThenExit(delay, code) => {
                    thread::sleep(*delay);
                    Ok(ExitInfo::Code(*code))
                }
                Script::RefuseToLaunch => unreachable!("launch already failed"),
            }
        }
    }

    impl Launcher for SpyLauncher {
        type Handle = ScriptedProcess;

        fn launch(&self, unit: &WorkloadUnit) -> io::Result<ScriptedProcess> {
            self.launched.lock().unwrap().push(unit.name.clone());

            let script = self
                .scripts
                .lock()
                .unwrap()
                .get(&unit.name)
                .cloned()
                .unwrap_or(Script::Exit(0));

            if matches!(script, Script::RefuseToLaunch) {
                return Err(io::Error::new(io::ErrorKind::NotFound, "no such program"));
            }

            Ok(ScriptedProcess { script })
        }
    }

    /// Sensor counting stop calls, optionally failing on stop.
    struct SpySensor {
        stops: Arc<AtomicUsize>,
        fail_on_stop: bool,
        running: bool,
    }

    impl SpySensor {
        fn new(stops: Arc<AtomicUsize>) -> Self {
            Self {
                stops,
                fail_on_stop: false,
                running: false,
            }
        }

        fn failing_on_stop(mut self) -> Self {
            self.fail_on_stop = true;
            self
        }
    }

    impl Sensor for SpySensor {
        fn begin(&mut self) -> Result<(), MeterError> {
            if self.running {
                return Err(MeterError::SensorBusy);
            }
            self.running = true;
            Ok(())
        }

        fn end(&mut self) -> Result<Reading, MeterError> {
            if !self.running {
                return Err(MeterError::SensorIdle);
            }
            self.running = false;
            self.stops.fetch_add(1, Ordering::SeqCst);

            if self.fail_on_stop {
                return Err(MeterError::SamplerPanicked);
            }

            Ok(Reading {
                duration: Duration::from_secs(1),
                energy_kwh: 0.000100,
                emissions_kg: 0.000047,
            })
        }
    }

    /// Sensor that refuses to start.
    struct DeadSensor;

    impl Sensor for DeadSensor {
        fn begin(&mut self) -> Result<(), MeterError> {
            Err(MeterError::SensorBusy)
        }

        fn end(&mut self) -> Result<Reading, MeterError> {
            Err(MeterError::SensorIdle)
        }
    }

    fn units(names: &[&str]) -> Vec<WorkloadUnit> {
        names
            .iter()
            .map(|n| WorkloadUnit::new(*n, "unused"))
            .collect()
    }

    fn sink(dir: &TempDir) -> EmissionsSink {
        EmissionsSink::new(dir.path().join("emissions.csv"))
    }

    #[test]
    fn test_all_units_succeed_in_order() {
        let dir = tempdir().unwrap();
        let stops = Arc::new(AtomicUsize::new(0));
        let launcher = SpyLauncher::new();
        let launched = launcher.launched();
        let runner = WorkloadRunner::with_launcher(launcher);

        let report = runner
            .run(
                &units(&["a", "b", "c"]),
                "ordered",
                sink(&dir),
                Box::new(SpySensor::new(Arc::clone(&stops))),
            )
            .unwrap();

        assert_eq!(report.records.len(), 3);
        let names: Vec<&str> = report.records.iter().map(|r| r.unit.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(report.all_succeeded());
        assert!(report.reading.is_some());
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(*launched.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_failing_unit_halts_subsequent_units() {
        let dir = tempdir().unwrap();
        let stops = Arc::new(AtomicUsize::new(0));
        let launcher = SpyLauncher::new().script("fail-unit", Script::Exit(2));
        let launched = launcher.launched();
        let runner = WorkloadRunner::with_launcher(launcher);

        let err = runner
            .run(
                &units(&["fail-unit", "never-run"]),
                "scenario_b",
                sink(&dir),
                Box::new(SpySensor::new(Arc::clone(&stops))),
            )
            .unwrap_err();

        match &err {
            RunError::WorkloadFailed { unit, status, report, stop_failure } => {
                assert_eq!(unit, "fail-unit");
                assert_eq!(*status, ExitInfo::Code(2));
                assert_eq!(report.records.len(), 1);
                assert!(report.reading.is_some());
                assert!(stop_failure.is_none());
            }
            other => panic!("expected WorkloadFailed, got {:?}", other),
        }

        // never-run was never launched; session stopped exactly once
        assert_eq!(*launched.lock().unwrap(), vec!["fail-unit"]);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_mid_list_failure_skips_remainder() {
        let dir = tempdir().unwrap();
        let stops = Arc::new(AtomicUsize::new(0));
        let launcher = SpyLauncher::new().script("k", Script::Exit(1));
        let launched = launcher.launched();
        let runner = WorkloadRunner::with_launcher(launcher);

        let err = runner
            .run(
                &units(&["a", "k", "x", "y"]),
                "mid_failure",
                sink(&dir),
                Box::new(SpySensor::new(Arc::clone(&stops))),
            )
            .unwrap_err();

        assert_eq!(*launched.lock().unwrap(), vec!["a", "k"]);
        assert_eq!(stops.load(Ordering::SeqCst), 1);

        // Records cover everything that ran, including the failure
        let report = err.report().unwrap();
        assert_eq!(report.records.len(), 2);
        assert!(report.records[0].status.success());
        assert!(!report.records[1].status.success());
    }

    #[test]
    fn test_empty_run_list_still_meters() {
        let dir = tempdir().unwrap();
        let stops = Arc::new(AtomicUsize::new(0));
        let runner = WorkloadRunner::with_launcher(SpyLauncher::new());

        let report = runner
            .run(
                &[],
                "scenario_c",
                sink(&dir),
                Box::new(SpySensor::new(Arc::clone(&stops))),
            )
            .unwrap();

        assert!(report.records.is_empty());
        assert!(report.reading.is_some());
        assert_eq!(stops.load(Ordering::SeqCst), 1);

        // The session row still reached the sink
        let content =
            std::fs::read_to_string(dir.path().join("emissions.csv")).unwrap();
        assert!(content.contains("scenario_c"));
    }

    #[test]
    fn test_sensor_start_failure_runs_nothing() {
        let dir = tempdir().unwrap();
        let launcher = SpyLauncher::new();
        let launched = launcher.launched();
        let runner = WorkloadRunner::with_launcher(launcher);

        let err = runner
            .run(&units(&["a"]), "dead", sink(&dir), Box::new(DeadSensor))
            .unwrap_err();

        assert!(matches!(err, RunError::SensorStart(_)));
        assert!(err.report().is_none());
        assert!(launched.lock().unwrap().is_empty());
    }

    #[test]
    fn test_stop_failure_preserves_all_records() {
        let dir = tempdir().unwrap();
        let stops = Arc::new(AtomicUsize::new(0));
        let runner = WorkloadRunner::with_launcher(SpyLauncher::new());

        let err = runner
            .run(
                &units(&["a", "b", "c"]),
                "scenario_d",
                sink(&dir),
                Box::new(SpySensor::new(Arc::clone(&stops)).failing_on_stop()),
            )
            .unwrap_err();

        match &err {
            RunError::SensorStop { report, .. } => {
                assert_eq!(report.records.len(), 3);
                assert!(report.reading.is_none());
                assert!(report.all_succeeded());
            }
            other => panic!("expected SensorStop, got {:?}", other),
        }

        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_workload_failure_with_secondary_stop_failure() {
        let dir = tempdir().unwrap();
        let stops = Arc::new(AtomicUsize::new(0));
        let launcher = SpyLauncher::new().script("bad", Script::Exit(7));
        let runner = WorkloadRunner::with_launcher(launcher);

        let err = runner
            .run(
                &units(&["bad", "after"]),
                "double_failure",
                sink(&dir),
                Box::new(SpySensor::new(Arc::clone(&stops)).failing_on_stop()),
            )
            .unwrap_err();

        // The workload failure stays primary; the stop failure is
        // attached as secondary detail, not dropped.
        match &err {
            RunError::WorkloadFailed { unit, stop_failure, report, .. } => {
                assert_eq!(unit, "bad");
                assert!(stop_failure.is_some());
                assert!(report.reading.is_none());
                assert_eq!(report.records.len(), 1);
            }
            other => panic!("expected WorkloadFailed, got {:?}", other),
        }

        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_launch_failure_halts_and_finalizes() {
        let dir = tempdir().unwrap();
        let stops = Arc::new(AtomicUsize::new(0));
        let launcher = SpyLauncher::new().script("ghost", Script::RefuseToLaunch);
        let launched = launcher.launched();
        let runner = WorkloadRunner::with_launcher(launcher);

        let err = runner
            .run(
                &units(&["ok", "ghost", "after"]),
                "launch_failure",
                sink(&dir),
                Box::new(SpySensor::new(Arc::clone(&stops))),
            )
            .unwrap_err();

        match &err {
            RunError::Launch { unit, report, .. } => {
                assert_eq!(unit, "ghost");
                // Only the unit that completed has a record
                assert_eq!(report.records.len(), 1);
                assert_eq!(report.records[0].unit, "ok");
            }
            other => panic!("expected Launch, got {:?}", other),
        }

        assert_eq!(*launched.lock().unwrap(), vec!["ok", "ghost"]);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_continue_on_failure_records_all_outcomes() {
        let dir = tempdir().unwrap();
        let stops = Arc::new(AtomicUsize::new(0));
        let launcher = SpyLauncher::new().script("flaky", Script::Exit(1));
        let launched = launcher.launched();
        let mut runner = WorkloadRunner::with_launcher(launcher);
        runner.set_continue_on_failure(true);

        let report = runner
            .run(
                &units(&["a", "flaky", "b"]),
                "keep_going",
                sink(&dir),
                Box::new(SpySensor::new(Arc::clone(&stops))),
            )
            .unwrap();

        assert_eq!(report.records.len(), 3);
        assert!(!report.all_succeeded());
        assert_eq!(report.failed_units(), vec!["flaky"]);
        assert_eq!(*launched.lock().unwrap(), vec!["a", "flaky", "b"]);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_durations_nonnegative_and_starts_monotonic() {
        let dir = tempdir().unwrap();
        let stops = Arc::new(AtomicUsize::new(0));
        let launcher = SpyLauncher::new()
            .script("a", Script::SleepThenExit(Duration::from_millis(30), 0))
            .script("b", Script::SleepThenExit(Duration::from_millis(30), 0));
        let runner = WorkloadRunner::with_launcher(launcher);

        let report = runner
            .run(
                &units(&["a", "b", "c"]),
                "timing",
                sink(&dir),
                Box::new(SpySensor::new(stops)),
            )
            .unwrap();

        for pair in report.records.windows(2) {
            assert!(pair[0].started_at <= pair[1].started_at);
        }
        assert!(report.records[0].duration >= Duration::from_millis(30));
    }

    #[test]
    fn test_sleep_unit_duration_close_to_delay() {
        // Scenario A against a real child process
        let dir = tempdir().unwrap();
        let stops = Arc::new(AtomicUsize::new(0));
        let runner = WorkloadRunner::new();

        let unit = WorkloadUnit::new("sleep-ok", "sleep").with_arg("0.2");

        let report = runner
            .run(
                &[unit],
                "scenario_a",
                sink(&dir),
                Box::new(SpySensor::new(Arc::clone(&stops))),
            )
            .unwrap();

        assert_eq!(report.records.len(), 1);
        assert!(report.records[0].status.success());
        let secs = report.records[0].duration.as_secs_f64();
        assert!(secs >= 0.2, "duration {} below the sleep delay", secs);
        assert!(secs < 2.0, "duration {} far above the sleep delay", secs);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }
}
