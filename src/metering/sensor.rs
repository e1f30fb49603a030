//! Usage Sensors
//!
//! A sensor accumulates one resource/energy reading over a bounded
//! interval: `begin` starts accumulation, `end` stops it and yields the
//! cumulative [`Reading`]. The underlying measurement is process-wide,
//! so a sensor must never be running twice concurrently.
//!
//! [`CpuEnergySensor`] is the default implementation. It samples global
//! CPU load on a background thread and converts average load over the
//! interval into an energy estimate and a CO2 figure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use sysinfo::System;
use thiserror::Error;

/// Nominal package power draw used for the energy estimate, in watts.
const DEFAULT_NOMINAL_WATTS: f64 = 85.0;

/// Grid carbon intensity in kg CO2 per kWh (world average mix).
const DEFAULT_CARBON_INTENSITY: f64 = 0.475;

/// Interval between CPU load samples.
const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

/// Errors raised by sensors and metering sessions.
#[derive(Debug, Error)]
pub enum MeterError {
    /// `begin` was called while the sensor was already accumulating.
    #[error("sensor is already running")]
    SensorBusy,

    /// `end` was called without a matching `begin`.
    #[error("sensor is not running")]
    SensorIdle,

    /// The background sampler thread panicked.
    #[error("sampler thread panicked")]
    SamplerPanicked,

    /// The emissions sink could not be written.
    #[error("failed to write emissions sink: {0}")]
    Sink(#[from] std::io::Error),
}

/// Cumulative reading for one metering interval.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct Reading {
    /// Length of the measured interval
    pub duration: Duration,

    /// Estimated energy consumed over the interval
    pub energy_kwh: f64,

    /// Estimated emissions derived from the energy figure
    pub emissions_kg: f64,
}

/// Start/stop contract for a cumulative usage sensor.
///
/// Implementations must tolerate `end` never being called only insofar
/// as their own `Drop` cleans up background resources; callers are
/// expected to pair every `begin` with exactly one `end`.
pub trait Sensor {
    /// Begins accumulating. Must not be called while already running.
    fn begin(&mut self) -> Result<(), MeterError>;

    /// Ends accumulation and returns the reading for the interval
    /// since `begin`.
    fn end(&mut self) -> Result<Reading, MeterError>;
}

/// Totals gathered by the sampler thread.
struct SamplerStats {
    cpu_sum: f64,
    samples: u32,
}

/// Handle to a running sampler thread.
struct ActiveSampler {
    stop_flag: Arc<AtomicBool>,
    handle: JoinHandle<SamplerStats>,
    started: Instant,
}

/// Default sensor: estimates energy from sampled CPU load.
///
/// A background thread samples global CPU usage until `end` is called.
/// Energy is estimated as nominal package power scaled by the average
/// load over the interval; emissions apply a grid intensity constant.
///
/// # Example
///
/// ```rust,ignore
/// use carbonrun::metering::{CpuEnergySensor, Sensor};
///
/// let mut sensor = CpuEnergySensor::new();
/// sensor.begin()?;
/// // ... run the workloads ...
/// let reading = sensor.end()?;
/// println!("{:.6} kg CO2", reading.emissions_kg);
/// ```
pub struct CpuEnergySensor {
    nominal_watts: f64,
    carbon_intensity: f64,
    sample_interval: Duration,
    active: Option<ActiveSampler>,
}

impl CpuEnergySensor {
    /// Creates a sensor with default power and intensity constants.
    pub fn new() -> Self {
        Self {
            nominal_watts: DEFAULT_NOMINAL_WATTS,
            carbon_intensity: DEFAULT_CARBON_INTENSITY,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            active: None,
        }
    }

    /// Sets the nominal package power draw in watts.
    pub fn with_nominal_watts(mut self, watts: f64) -> Self {
        self.nominal_watts = watts;
        self
    }

    /// Sets the grid carbon intensity in kg CO2 per kWh.
    pub fn with_carbon_intensity(mut self, intensity: f64) -> Self {
        self.carbon_intensity = intensity;
        self
    }

    /// Sets the interval between CPU load samples.
    ///
    /// Values below the platform's minimum CPU update interval are
    /// clamped up to it.
    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        self
    }

    /// Returns true if the sensor is currently accumulating.
    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }
}

impl Default for CpuEnergySensor {
    fn default() -> Self {
        Self::new()
    }
}

impl Sensor for CpuEnergySensor {
    fn begin(&mut self) -> Result<(), MeterError> {
        if self.active.is_some() {
            return Err(MeterError::SensorBusy);
        }

        let stop_flag = Arc::new(AtomicBool::new(false));
        let sampler_flag = Arc::clone(&stop_flag);
        let interval = self.sample_interval;

        let handle = thread::spawn(move || {
            let mut system = System::new();

            // First refresh is warmup (required for accurate CPU readings)
            system.refresh_cpu_usage();

            let mut cpu_sum = 0.0f64;
            let mut samples = 0u32;

            while !sampler_flag.load(Ordering::Relaxed) {
                thread::sleep(interval);
                system.refresh_cpu_usage();
                cpu_sum += system.global_cpu_info().cpu_usage() as f64;
                samples += 1;
            }

            SamplerStats { cpu_sum, samples }
        });

        debug!("Sensor started (sample interval: {:?})", interval);

        self.active = Some(ActiveSampler {
            stop_flag,
            handle,
            started: Instant::now(),
        });

        Ok(())
    }

    fn end(&mut self) -> Result<Reading, MeterError> {
        let active = self.active.take().ok_or(MeterError::SensorIdle)?;

        active.stop_flag.store(true, Ordering::Relaxed);
        let stats = active
            .handle
            .join()
            .map_err(|_| MeterError::SamplerPanicked)?;

        let duration = active.started.elapsed();

        let load = if stats.samples == 0 {
            0.0
        } else {
            (stats.cpu_sum / stats.samples as f64 / 100.0).clamp(0.0, 1.0)
        };

        let energy_kwh =
            self.nominal_watts * load * duration.as_secs_f64() / 3600.0 / 1000.0;

        debug!(
            "Sensor stopped: {} samples, average load {:.1}%",
            stats.samples,
            load * 100.0
        );

        Ok(Reading {
            duration,
            energy_kwh,
            emissions_kg: energy_kwh * self.carbon_intensity,
        })
    }
}

impl Drop for CpuEnergySensor {
    fn drop(&mut self) {
        // Shut the sampler down if the sensor is dropped mid-interval
        if let Some(active) = self.active.take() {
            warn!("Sensor dropped while running - discarding reading");
            active.stop_flag.store(true, Ordering::Relaxed);
            let _ = active.handle.join();
        }
    }
}
