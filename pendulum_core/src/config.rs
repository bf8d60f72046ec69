//! Runtime configuration types for the measurement pipeline.
//!
//! These are the structs the components consume. They are separate from the
//! TOML-deserialized config in `pendulum_config`; see `conversions`.
use std::time::Duration;

/// Force-bridge sampling for the mass estimator.
#[derive(Debug, Clone)]
pub struct MassCfg {
    /// Bridge device serial number.
    pub serial_number: u32,
    /// Cells sharing the plate load; also the total-load scale factor.
    pub channels: u32,
    pub attach_timeout: Duration,
    /// Wait after opening channels before the first sample.
    pub settle: Duration,
    /// Number of sampling ticks.
    pub samples: u32,
    pub sample_interval: Duration,
}

impl Default for MassCfg {
    fn default() -> Self {
        Self {
            serial_number: 716_326,
            channels: 3,
            attach_timeout: Duration::from_secs(5),
            settle: Duration::from_secs(2),
            samples: 20,
            sample_interval: Duration::from_millis(100),
        }
    }
}

/// Release sequence timing and pulse counts.
#[derive(Debug, Clone)]
pub struct TriggerCfg {
    /// Wait with the magnets engaged before moving the stepper.
    pub hold_settle: Duration,
    /// Wait after release before returning the mechanism.
    pub release_settle: Duration,
    /// Step line low time and high time, each.
    pub half_period: Duration,
    pub preload_steps: u32,
    pub release_steps: u32,
    pub return_steps: u32,
}

impl Default for TriggerCfg {
    fn default() -> Self {
        Self {
            hold_settle: Duration::from_secs(1),
            release_settle: Duration::from_secs(1),
            half_period: Duration::from_micros(1500),
            preload_steps: 120,
            release_steps: 300,
            return_steps: 180,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AcquisitionCfg {
    pub duration: Duration,
    pub sample_rate_hz: f64,
    /// Offset inside the window at which the trigger fires.
    pub trigger_at: Duration,
}

impl Default for AcquisitionCfg {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(30),
            sample_rate_hz: 100.0,
            trigger_at: Duration::from_secs(1),
        }
    }
}

/// Suspension geometry used by the moment-of-inertia formula.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigGeometry {
    pub radius_m: f64,
    pub cable_length_m: f64,
}

impl Default for RigGeometry {
    fn default() -> Self {
        Self {
            radius_m: 0.4572,
            cable_length_m: 1.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisCfg {
    /// Trigger offset used when the signal was acquired (s).
    pub trigger_at_s: f64,
    /// Steady window starts this long after the trigger (s).
    pub steady_delay_s: f64,
    pub smoothing_window: usize,
    /// Minimum height of a local maximum counted as a peak (deg/s).
    pub peak_height_dps: f64,
    /// Peaks closer than this to a higher peak are dropped; 0 keeps all (s).
    pub peak_min_distance_s: f64,
    pub max_fit_evals: usize,
    /// Settling time in decay time constants.
    pub settling_time_constants: f64,
    pub geometry: RigGeometry,
}

impl AnalysisCfg {
    /// First timestamp that belongs to the steady window.
    #[inline]
    pub fn steady_start_s(&self) -> f64 {
        self.trigger_at_s + self.steady_delay_s
    }
}

impl Default for AnalysisCfg {
    fn default() -> Self {
        Self {
            trigger_at_s: 1.0,
            steady_delay_s: 2.0,
            smoothing_window: 10,
            peak_height_dps: 0.1,
            peak_min_distance_s: 0.0,
            max_fit_evals: 10_000,
            settling_time_constants: 4.0,
            geometry: RigGeometry::default(),
        }
    }
}
