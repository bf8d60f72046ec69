//! Plate/object mass estimation from the force bridge.
//!
//! Each `measure` call opens the configured channels, lets the callbacks fill
//! an estimator-owned readings buffer, samples snapshots of it at a fixed
//! interval and closes every channel again before returning. Nothing outlives
//! the call.
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use pendulum_traits::{BridgeChannel, Clock, ForceBridge};
use tracing::{debug, info, warn};

use crate::calibration::CalibrationModel;
use crate::cancel::CancelToken;
use crate::config::MassCfg;
use crate::error::{Result, RigError};
use crate::hw_error::map_hw_error;

/// Latest ratio per channel, written by bridge callbacks.
#[derive(Debug, Clone, Default)]
pub struct Readings {
    latest: Arc<Mutex<BTreeMap<u32, f64>>>,
}

impl Readings {
    pub fn record(&self, channel: u32, ratio: f64) {
        if let Ok(mut m) = self.latest.lock() {
            m.insert(channel, ratio);
        }
    }

    /// Copy of the current readings; callbacks may keep writing meanwhile.
    pub fn snapshot(&self) -> BTreeMap<u32, f64> {
        self.latest.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

/// Open bridge channels; all of them are closed on drop.
pub struct ChannelSet {
    channels: Vec<Box<dyn BridgeChannel + Send>>,
    readings: Readings,
}

impl ChannelSet {
    /// Open channels `0..cfg.channels`. A channel that fails to attach is
    /// logged and skipped; zero attached channels is an error.
    pub fn open<B: ForceBridge + ?Sized>(bridge: &mut B, cfg: &MassCfg) -> Result<Self> {
        let readings = Readings::default();
        let mut channels = Vec::with_capacity(cfg.channels as usize);
        for ch in 0..cfg.channels {
            let sink_readings = readings.clone();
            let sink = Box::new(move |channel: u32, ratio: f64| {
                sink_readings.record(channel, ratio);
            });
            match bridge.open_channel(cfg.serial_number, ch, cfg.attach_timeout, sink) {
                Ok(handle) => {
                    debug!(channel = ch, "bridge channel open");
                    channels.push(handle);
                }
                Err(e) => {
                    let err = map_hw_error(e.as_ref());
                    warn!(channel = ch, error = %err, "bridge channel unavailable; continuing without it");
                }
            }
        }
        if channels.is_empty() {
            return Err(eyre::Report::new(RigError::HardwareUnavailable(format!(
                "no bridge channel attached on device {}",
                cfg.serial_number
            ))));
        }
        Ok(Self { channels, readings })
    }

    pub fn attached(&self) -> usize {
        self.channels.len()
    }

    pub fn readings(&self) -> &Readings {
        &self.readings
    }
}

impl Drop for ChannelSet {
    fn drop(&mut self) {
        for mut handle in self.channels.drain(..) {
            let ch = handle.channel();
            if let Err(e) = handle.close() {
                warn!(channel = ch, error = %e, "failed to close bridge channel");
            }
        }
    }
}

/// Result of one mass measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassEstimate {
    /// Total load in kilograms, minus the baseline when one was given.
    pub kg: f64,
    /// Ticks that produced a sample.
    pub samples: usize,
    /// Channels that attached.
    pub channels: usize,
    pub baseline_kg: Option<f64>,
}

impl MassEstimate {
    pub fn lb(&self) -> f64 {
        crate::util::kg_to_lb(self.kg)
    }
}

/// Mean of calibrated per-channel values; `None` when no channel has reported yet.
pub fn tick_value(snapshot: &BTreeMap<u32, f64>, cal: &CalibrationModel) -> Option<f64> {
    let values: Vec<f64> = snapshot.values().map(|&r| cal.apply(r)).collect();
    crate::util::mean(&values)
}

/// `scale * mean(values) - baseline`; `InsufficientData` for no values.
pub fn combine(values: &[f64], scale: u32, baseline: Option<f64>) -> Result<f64> {
    let m = crate::util::mean(values).ok_or_else(|| {
        eyre::Report::new(RigError::InsufficientData(
            "no force samples were collected".into(),
        ))
    })?;
    Ok(f64::from(scale) * m - baseline.unwrap_or(0.0))
}

pub struct MassEstimator<C: Clock> {
    calibration: CalibrationModel,
    cfg: MassCfg,
    clock: C,
}

impl<C: Clock> MassEstimator<C> {
    pub fn new(calibration: CalibrationModel, cfg: MassCfg, clock: C) -> Self {
        Self {
            calibration,
            cfg,
            clock,
        }
    }

    pub fn config(&self) -> &MassCfg {
        &self.cfg
    }

    /// Measure the load on the plate, minus `baseline` when given.
    ///
    /// Result is `channels * mean(tick values)` with the configured channel
    /// count, even when fewer channels attached.
    pub fn measure<B: ForceBridge + ?Sized>(
        &self,
        bridge: &mut B,
        baseline: Option<f64>,
        cancel: &CancelToken,
    ) -> Result<MassEstimate> {
        cancel.check()?;
        let set = ChannelSet::open(bridge, &self.cfg)?;
        if set.attached() < self.cfg.channels as usize {
            warn!(
                attached = set.attached(),
                configured = self.cfg.channels,
                "fewer bridge channels than configured; total still scaled by configured count"
            );
        }

        cancel.sleep(&self.clock, self.cfg.settle)?;

        let mut values = Vec::with_capacity(self.cfg.samples as usize);
        for tick in 0..self.cfg.samples {
            cancel.check()?;
            let snap = set.readings().snapshot();
            match tick_value(&snap, &self.calibration) {
                Some(v) => values.push(v),
                None => debug!(tick, "no bridge data yet; tick skipped"),
            }
            cancel.sleep(&self.clock, self.cfg.sample_interval)?;
        }

        let kg = combine(&values, self.cfg.channels, baseline)?;
        let est = MassEstimate {
            kg,
            samples: values.len(),
            channels: set.attached(),
            baseline_kg: baseline,
        };
        info!(
            kg = est.kg,
            samples = est.samples,
            channels = est.channels,
            baseline = ?baseline,
            "mass measured"
        );
        Ok(est)
    }
}
