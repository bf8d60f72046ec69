//! `From` implementations bridging `pendulum_config` types to `pendulum_core` types.
//!
//! These keep field-by-field mapping out of the CLI.

use std::time::Duration;

use crate::calibration::CalibrationModel;
use crate::config::{AcquisitionCfg, AnalysisCfg, MassCfg, RigGeometry, TriggerCfg};
use crate::error::BuildError;

/// Seconds from config to `Duration`; negative or non-finite values clamp to zero.
fn secs(s: f64) -> Duration {
    Duration::try_from_secs_f64(s).unwrap_or(Duration::ZERO)
}

// ── MassCfg ──────────────────────────────────────────────────────────────────

impl From<&pendulum_config::ForceCfg> for MassCfg {
    fn from(c: &pendulum_config::ForceCfg) -> Self {
        Self {
            serial_number: c.serial_number,
            channels: c.channels,
            attach_timeout: Duration::from_millis(c.attach_timeout_ms),
            settle: Duration::from_millis(c.settle_ms),
            samples: c.samples,
            sample_interval: Duration::from_millis(c.sample_interval_ms),
        }
    }
}

// ── TriggerCfg ───────────────────────────────────────────────────────────────

impl From<&pendulum_config::TriggerCfg> for TriggerCfg {
    fn from(c: &pendulum_config::TriggerCfg) -> Self {
        Self {
            hold_settle: Duration::from_millis(c.hold_settle_ms),
            release_settle: Duration::from_millis(c.release_settle_ms),
            half_period: Duration::from_micros(c.half_period_us),
            preload_steps: c.preload_steps,
            release_steps: c.release_steps,
            return_steps: c.return_steps,
        }
    }
}

// ── AcquisitionCfg ───────────────────────────────────────────────────────────

impl From<&pendulum_config::AcquisitionCfg> for AcquisitionCfg {
    fn from(c: &pendulum_config::AcquisitionCfg) -> Self {
        Self {
            duration: secs(c.duration_s),
            sample_rate_hz: c.sample_rate_hz,
            trigger_at: secs(c.trigger_at_s),
        }
    }
}

// ── RigGeometry ──────────────────────────────────────────────────────────────

impl From<&pendulum_config::RigCfg> for RigGeometry {
    fn from(c: &pendulum_config::RigCfg) -> Self {
        Self {
            radius_m: c.radius_m,
            cable_length_m: c.cable_length_m,
        }
    }
}

// ── AnalysisCfg ──────────────────────────────────────────────────────────────

/// Analysis needs the trigger offset and geometry, so it maps from the whole document.
impl From<&pendulum_config::Config> for AnalysisCfg {
    fn from(c: &pendulum_config::Config) -> Self {
        let a = &c.analysis;
        Self {
            trigger_at_s: c.acquisition.trigger_at_s,
            steady_delay_s: a.steady_delay_s,
            smoothing_window: a.smoothing_window,
            peak_height_dps: a.peak_height_dps,
            peak_min_distance_s: a.peak_min_distance_s,
            max_fit_evals: a.max_fit_evals,
            settling_time_constants: a.settling_time_constants,
            geometry: RigGeometry::from(&c.rig),
        }
    }
}

// ── Calibration ──────────────────────────────────────────────────────────────

impl TryFrom<&pendulum_config::ForceCfg> for CalibrationModel {
    type Error = BuildError;
    fn try_from(c: &pendulum_config::ForceCfg) -> Result<Self, Self::Error> {
        Self::new(c.gain, c.offset)
    }
}

impl TryFrom<&pendulum_config::Calibration> for CalibrationModel {
    type Error = BuildError;
    fn try_from(c: &pendulum_config::Calibration) -> Result<Self, Self::Error> {
        Self::new(c.gain, c.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_survive_the_trip() {
        let cfg = pendulum_config::Config::default();
        let mass = MassCfg::from(&cfg.force);
        assert_eq!(mass.channels, 3);
        assert_eq!(mass.settle, Duration::from_secs(2));
        let trig = TriggerCfg::from(&cfg.trigger);
        assert_eq!(trig.half_period, Duration::from_micros(1500));
        let acq = AcquisitionCfg::from(&cfg.acquisition);
        assert_eq!(acq.duration, Duration::from_secs(30));
        let an = AnalysisCfg::from(&cfg);
        assert!((an.steady_start_s() - 3.0).abs() < 1e-12);
        let cal = CalibrationModel::try_from(&cfg.force).unwrap();
        assert_eq!(cal, CalibrationModel::default());
    }

    #[test]
    fn negative_seconds_clamp_to_zero() {
        assert_eq!(secs(-1.0), Duration::ZERO);
        assert_eq!(secs(f64::NAN), Duration::ZERO);
    }
}
