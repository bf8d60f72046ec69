//! Foreground handle that runs experiment steps on a background worker.
//!
//! Mass measurements and acquisitions block for seconds, so each one runs on
//! its own thread that reports exactly one result through a single-slot
//! channel. The foreground polls (`poll`) or blocks (`wait`) for it. At most
//! one worker exists at a time; `start` while one is outstanding is `Busy`.
//!
//! Safety: the worker thread is joined on `reset` and on drop, after its
//! cancellation token has been set, so no worker outlives the session.
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel as xch;
use pendulum_traits::{Clock, RigFactory};
use tracing::{debug, info, warn};

use crate::acquisition::AcquisitionLoop;
use crate::analysis::{AnalysisEngine, AnalysisResult};
use crate::calibration::CalibrationModel;
use crate::cancel::CancelToken;
use crate::config::{AcquisitionCfg, AnalysisCfg, MassCfg, TriggerCfg};
use crate::error::{BuildError, Result, RigError};
use crate::hw_error::boxed;
use crate::mass::MassEstimator;
use crate::orchestrator::{Experiment, Outcome, Stage, Step, Ticket};
use crate::trigger::TriggerSequencer;

/// The measurement components a session drives.
pub struct Components<C: Clock> {
    pub mass: MassEstimator<C>,
    pub trigger: TriggerSequencer<C>,
    pub acquisition: AcquisitionLoop<C>,
    pub analysis: AnalysisEngine,
}

impl<C: Clock + Clone> Components<C> {
    /// Build every component from a validated config document.
    pub fn from_config(
        cfg: &pendulum_config::Config,
        calibration: Option<&pendulum_config::Calibration>,
        clock: C,
    ) -> std::result::Result<Self, BuildError> {
        let model = match calibration {
            Some(c) => CalibrationModel::try_from(c)?,
            None => CalibrationModel::try_from(&cfg.force)?,
        };
        let acq = AcquisitionCfg::from(&cfg.acquisition);
        if acq.trigger_at >= acq.duration {
            return Err(BuildError::InvalidConfig(
                "trigger must fire inside the acquisition window",
            ));
        }
        let trigger = TriggerSequencer::new(TriggerCfg::from(&cfg.trigger), clock.clone());
        let resumes_at = acq.trigger_at + trigger.duration();
        if resumes_at >= acq.duration {
            warn!(
                resumes_at_s = resumes_at.as_secs_f64(),
                duration_s = acq.duration.as_secs_f64(),
                "release sequence outlasts the acquisition window; no oscillation will be sampled"
            );
        }
        Ok(Self {
            mass: MassEstimator::new(model, MassCfg::from(&cfg.force), clock.clone()),
            trigger,
            acquisition: AcquisitionLoop::new(acq, clock),
            analysis: AnalysisEngine::new(AnalysisCfg::from(cfg)),
        })
    }
}

struct Pending {
    ticket: Ticket,
    rx: xch::Receiver<std::result::Result<Outcome, RigError>>,
    cancel: CancelToken,
    handle: Option<JoinHandle<()>>,
}

impl Pending {
    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!(step = %self.ticket.step(), "worker panicked");
            }
        }
    }
}

pub struct Session<C: Clock> {
    experiment: Experiment,
    components: Arc<Components<C>>,
    hardware: Arc<dyn RigFactory>,
    pending: Option<Pending>,
}

/// Collapse a worker's report into the typed error carried over the channel.
fn to_rig_error(e: &eyre::Report) -> RigError {
    e.downcast_ref::<RigError>()
        .cloned()
        .unwrap_or_else(|| RigError::Worker(format!("{e:#}")))
}

impl<C> Session<C>
where
    C: Clock + Send + Sync + 'static,
{
    pub fn new(components: Components<C>, hardware: Arc<dyn RigFactory>) -> Self {
        Self {
            experiment: Experiment::new(),
            components: Arc::new(components),
            hardware,
            pending: None,
        }
    }

    pub fn experiment(&self) -> &Experiment {
        &self.experiment
    }

    pub fn stage(&self) -> Stage {
        self.experiment.stage()
    }

    pub fn components(&self) -> &Components<C> {
        &self.components
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Start `step` on a background worker.
    ///
    /// `Analyze` runs in the foreground; use [`Session::analyze`].
    pub fn start(&mut self, step: Step) -> std::result::Result<(), RigError> {
        if self.pending.is_some() {
            return Err(RigError::Busy);
        }
        let ticket = self.experiment.ticket(step)?;
        let baseline = self.experiment.baseline().map(|m| m.kg);
        let job: Box<dyn FnOnce(&CancelToken) -> Result<Outcome> + Send> = match step {
            Step::MeasurePlate => {
                let (c, hw) = (self.components.clone(), self.hardware.clone());
                Box::new(move |cancel: &CancelToken| {
                    let mut bridge = hw.bridge().map_err(boxed)?;
                    c.mass
                        .measure(&mut bridge, None, cancel)
                        .map(Outcome::PlateMass)
                })
            }
            Step::MeasureObject => {
                let (c, hw) = (self.components.clone(), self.hardware.clone());
                Box::new(move |cancel: &CancelToken| {
                    let mut bridge = hw.bridge().map_err(boxed)?;
                    c.mass
                        .measure(&mut bridge, baseline, cancel)
                        .map(Outcome::ObjectMass)
                })
            }
            Step::Acquire => {
                let (c, hw) = (self.components.clone(), self.hardware.clone());
                Box::new(move |cancel: &CancelToken| {
                    let mut gyro = hw.gyro().map_err(boxed)?;
                    let mut stepper = hw.stepper().map_err(boxed)?;
                    let mut magnets = hw.magnets().map_err(boxed)?;
                    c.acquisition
                        .acquire(
                            &mut gyro,
                            || c.trigger.fire(&mut stepper, &mut magnets, cancel),
                            cancel,
                        )
                        .map(Outcome::Oscillation)
                })
            }
            Step::Analyze => {
                return Err(RigError::Config(
                    "analysis runs in the foreground; call analyze()".into(),
                ));
            }
        };

        let (tx, rx) = xch::bounded(1);
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        info!(step = %step, "worker start");
        let handle = std::thread::Builder::new()
            .name(format!("pendulum-{step:?}").to_lowercase())
            .spawn(move || {
                let res = job(&worker_cancel).map_err(|e| to_rig_error(&e));
                if let Err(e) = &res {
                    debug!(error = %e, "worker finished with error");
                }
                // A closed channel means the session dropped the request.
                let _ = tx.send(res);
            })
            .map_err(|e| RigError::Worker(e.to_string()))?;

        self.pending = Some(Pending {
            ticket,
            rx,
            cancel,
            handle: Some(handle),
        });
        Ok(())
    }

    /// Non-blocking check for the outstanding worker's result.
    ///
    /// `None` while it is still running or when nothing was started.
    pub fn poll(&mut self) -> Option<std::result::Result<Stage, RigError>> {
        let received = match &self.pending {
            None => return None,
            Some(p) => match p.rx.try_recv() {
                Ok(r) => r,
                Err(xch::TryRecvError::Empty) => return None,
                Err(xch::TryRecvError::Disconnected) => {
                    Err(RigError::Worker("worker exited without a result".into()))
                }
            },
        };
        Some(self.finish(received))
    }

    /// Block until the outstanding worker reports.
    pub fn wait(&mut self) -> std::result::Result<Stage, RigError> {
        let received = match &self.pending {
            None => return Err(RigError::Worker("no measurement in progress".into())),
            Some(p) => p
                .rx
                .recv()
                .unwrap_or_else(|_| Err(RigError::Worker("worker exited without a result".into()))),
        };
        self.finish(received)
    }

    fn finish(
        &mut self,
        received: std::result::Result<Outcome, RigError>,
    ) -> std::result::Result<Stage, RigError> {
        let Some(mut pending) = self.pending.take() else {
            return Err(RigError::Worker("no measurement in progress".into()));
        };
        pending.join();
        match received {
            Ok(outcome) => self.experiment.apply(pending.ticket, outcome),
            Err(e) => {
                warn!(step = %pending.ticket.step(), error = %e, "step failed; stage unchanged");
                Err(e)
            }
        }
    }

    /// Run `start` then `wait`.
    pub fn run(&mut self, step: Step) -> std::result::Result<Stage, RigError> {
        self.start(step)?;
        self.wait()
    }

    /// Ask the outstanding worker to stop at its next check.
    pub fn cancel(&self) {
        if let Some(p) = &self.pending {
            p.cancel.cancel();
        }
    }

    /// Analyze the recorded oscillation with the measured object mass.
    pub fn analyze(&mut self) -> std::result::Result<&AnalysisResult, RigError> {
        if self.pending.is_some() {
            return Err(RigError::Busy);
        }
        let ticket = self.experiment.ticket(Step::Analyze)?;
        let (Some(acq), Some(object)) = (self.experiment.oscillation(), self.experiment.object())
        else {
            return Err(RigError::InsufficientData(
                "no recorded oscillation or object mass".into(),
            ));
        };
        let result = self.components.analysis.analyze(&acq.signal, object.kg);
        self.experiment.apply(ticket, Outcome::Results(result))?;
        self.experiment
            .results()
            .ok_or_else(|| RigError::InsufficientData("analysis result missing".into()))
    }

    /// Cancel and join any worker, then clear the experiment.
    pub fn reset(&mut self) {
        if let Some(mut p) = self.pending.take() {
            p.cancel.cancel();
            p.join();
        }
        self.experiment.reset();
    }
}

impl<C: Clock> Drop for Session<C> {
    fn drop(&mut self) {
        if let Some(mut p) = self.pending.take() {
            p.cancel.cancel();
            p.join();
        }
    }
}
