//! Device backend for the CLI.
//!
//! Sensors are always simulated; the release mechanism can be real GPIO
//! with the `hardware` feature (see `bench::trigger`).

use pendulum_config::{Calibration, Config};
use pendulum_hardware::{SimParams, SimRig};
use pendulum_traits::MonotonicClock;

/// Simulated rig built from the `[simulation]` section. The simulated cells
/// respond with the effective calibration, so measured masses come back as
/// configured.
pub fn sim_rig(cfg: &Config, calibration: Option<&Calibration>) -> SimRig<MonotonicClock> {
    let (gain, offset) = calibration.map_or((cfg.force.gain, cfg.force.offset), |c| (c.gain, c.offset));
    let s = &cfg.simulation;
    let params = SimParams {
        plate_kg: s.plate_kg,
        object_kg: s.object_kg,
        period_s: s.period_s,
        tau_s: s.tau_s,
        amplitude_dps: s.amplitude_dps,
        noise_dps: s.noise_dps,
        gyro_bias_dps: s.gyro_bias_dps,
        gain,
        offset,
        channels: cfg.force.channels,
        failed_channels: s.failed_channels.clone(),
        silent_channels: Vec::new(),
    };
    SimRig::new(params, MonotonicClock::new())
}
