//! Fixed-rate angular-rate acquisition with a mid-window trigger.
//!
//! Single-threaded by intent: the trigger runs synchronously inside the loop,
//! so sampling pauses while the release mechanism moves. Timestamps always
//! come from the loop's own elapsed counter, which keeps `times` strictly
//! increasing across that gap.
use pendulum_traits::{Clock, Gyro};
use tracing::{debug, info, trace, warn};

use crate::cancel::CancelToken;
use crate::config::AcquisitionCfg;
use crate::error::Result;
use crate::hw_error::{boxed, map_hw_error};
use crate::signal::Signal;

/// Upper bound on the up-front sample buffer; longer runs grow it on demand.
const MAX_PREALLOC: usize = 1 << 20;

/// Bookkeeping for one acquisition run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcquisitionStats {
    pub samples: usize,
    /// Ticks whose sensor read failed and were skipped.
    pub faults: usize,
    /// Zeroing offset subtracted from every reading (deg/s).
    pub zero_offset_dps: f64,
    /// Loop time at which the trigger started, if it fired.
    pub trigger_at_s: Option<f64>,
    pub effective_rate_hz: f64,
    /// Largest gap between consecutive samples (s), trigger pause included.
    pub max_gap_s: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Acquisition {
    pub signal: Signal,
    pub stats: AcquisitionStats,
}

pub struct AcquisitionLoop<C: Clock> {
    cfg: AcquisitionCfg,
    clock: C,
}

impl<C: Clock> AcquisitionLoop<C> {
    pub fn new(cfg: AcquisitionCfg, clock: C) -> Self {
        Self { cfg, clock }
    }

    pub fn config(&self) -> &AcquisitionCfg {
        &self.cfg
    }

    /// Sample `gyro` Z for `duration`, calling `trigger` exactly once at the
    /// first tick at or after `trigger_at`.
    pub fn acquire<G, F>(&self, gyro: &mut G, mut trigger: F, cancel: &CancelToken) -> Result<Acquisition>
    where
        G: Gyro + ?Sized,
        F: FnMut() -> Result<()>,
    {
        cancel.check()?;
        let zero = gyro.read_z().map_err(boxed)?;
        gyro.discard_pending().map_err(boxed)?;
        debug!(zero, "gyro zeroed");

        let period = crate::util::period(self.cfg.sample_rate_hz);
        let duration = self.cfg.duration.as_secs_f64();
        let trigger_at = self.cfg.trigger_at.as_secs_f64();
        let expected = (duration * self.cfg.sample_rate_hz)
            .ceil()
            .clamp(0.0, MAX_PREALLOC as f64) as usize;

        let mut signal = Signal::with_capacity(expected);
        let mut faults = 0usize;
        let mut fired_at: Option<f64> = None;
        let mut max_gap = 0.0f64;

        info!(
            duration_s = duration,
            rate_hz = self.cfg.sample_rate_hz,
            trigger_at_s = trigger_at,
            "acquisition start"
        );
        let epoch = self.clock.now();
        let mut deadline = epoch;
        loop {
            cancel.check()?;
            let mut t = self.clock.secs_since(epoch);
            if t >= duration {
                break;
            }
            if fired_at.is_none() && t >= trigger_at {
                fired_at = Some(t);
                trigger()?;
                t = self.clock.secs_since(epoch);
                debug!(resumed_at = t, "trigger returned");
                if t >= duration {
                    break;
                }
            }

            match gyro.read_z() {
                Ok(z) => {
                    if let Some(&last) = signal.times().last() {
                        max_gap = max_gap.max(t - last);
                    }
                    match signal.push(t, z - zero) {
                        Ok(()) => trace!(t, z, "sample"),
                        Err(e) => {
                            faults += 1;
                            warn!(error = %e, "sample dropped");
                        }
                    }
                }
                Err(e) => {
                    faults += 1;
                    warn!(t, error = %map_hw_error(e.as_ref()), "gyro read failed; tick skipped");
                }
            }

            // Next slot; after a long pause, resume one period from now
            // instead of bursting through the missed slots.
            deadline += period;
            let now = self.clock.now();
            if deadline <= now {
                deadline = now + period;
            }
            cancel.sleep(&self.clock, deadline.saturating_duration_since(now))?;
        }

        if fired_at.is_none() {
            warn!(trigger_at_s = trigger_at, "acquisition ended before the trigger fired");
        }

        let effective_rate_hz = if signal.len() > 1 && signal.span() > 0.0 {
            (signal.len() - 1) as f64 / signal.span()
        } else {
            0.0
        };
        let stats = AcquisitionStats {
            samples: signal.len(),
            faults,
            zero_offset_dps: zero,
            trigger_at_s: fired_at,
            effective_rate_hz,
            max_gap_s: max_gap,
        };
        info!(
            samples = stats.samples,
            faults = stats.faults,
            effective_rate_hz = stats.effective_rate_hz,
            max_gap_s = stats.max_gap_s,
            "acquisition complete"
        );
        Ok(Acquisition { signal, stats })
    }
}
