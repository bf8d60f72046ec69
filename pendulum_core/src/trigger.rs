//! One-shot release sequence: hold, preload, release, return.
use pendulum_traits::{Clock, HoldMagnets, Stepper};
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::config::TriggerCfg;
use crate::error::Result;
use crate::hw_error::boxed;

/// Stepper direction used for preload and return moves.
const DIR_A: bool = true;
/// Stepper direction used for the release move.
const DIR_B: bool = false;

pub struct TriggerSequencer<C: Clock> {
    cfg: TriggerCfg,
    clock: C,
}

impl<C: Clock> TriggerSequencer<C> {
    pub fn new(cfg: TriggerCfg, clock: C) -> Self {
        Self { cfg, clock }
    }

    pub fn config(&self) -> &TriggerCfg {
        &self.cfg
    }

    /// Run the full sequence, blocking the caller until the mechanism is back.
    ///
    /// 1. engage hold magnets, wait `hold_settle`
    /// 2. `preload_steps` in direction A
    /// 3. `release_steps` in direction B
    /// 4. disengage hold magnets (the object is released here)
    /// 5. wait `release_settle`, then `return_steps` in direction A
    ///
    /// Cancellation is honoured between pulses and during the settle waits.
    /// A sequence cancelled before step 4 leaves the hold magnets engaged.
    pub fn fire<S, M>(&self, stepper: &mut S, magnets: &mut M, cancel: &CancelToken) -> Result<()>
    where
        S: Stepper + ?Sized,
        M: HoldMagnets + ?Sized,
    {
        info!("trigger sequence start");
        cancel.check()?;
        magnets.set_engaged(true).map_err(boxed)?;
        cancel.sleep(&self.clock, self.cfg.hold_settle)?;

        self.move_steps(stepper, DIR_A, self.cfg.preload_steps, cancel)?;
        self.move_steps(stepper, DIR_B, self.cfg.release_steps, cancel)?;

        magnets.set_engaged(false).map_err(boxed)?;
        info!("object released");
        cancel.sleep(&self.clock, self.cfg.release_settle)?;

        self.move_steps(stepper, DIR_A, self.cfg.return_steps, cancel)?;
        info!("trigger sequence complete");
        Ok(())
    }

    fn move_steps<S: Stepper + ?Sized>(
        &self,
        stepper: &mut S,
        forward: bool,
        n: u32,
        cancel: &CancelToken,
    ) -> Result<()> {
        debug!(forward, steps = n, "stepper move");
        stepper.set_direction(forward).map_err(boxed)?;
        for _ in 0..n {
            cancel.check()?;
            stepper.set_step(false).map_err(boxed)?;
            self.clock.sleep(self.cfg.half_period);
            stepper.set_step(true).map_err(boxed)?;
            self.clock.sleep(self.cfg.half_period);
        }
        Ok(())
    }

    /// Wall time the sequence occupies with the current configuration.
    pub fn duration(&self) -> std::time::Duration {
        let pulses =
            self.cfg.preload_steps + self.cfg.release_steps + self.cfg.return_steps;
        self.cfg.hold_settle + self.cfg.release_settle + self.cfg.half_period * 2 * pulses
    }
}
