//! Experiment state machine: plate, object, oscillation, results.
//!
//! Stages only move forward. A step requested from the wrong stage is
//! rejected and leaves everything untouched; `reset` starts over from any
//! stage. Work handed to a worker carries a [`Ticket`]; a ticket issued
//! before a reset no longer applies.
use std::fmt;

use tracing::info;

use crate::acquisition::Acquisition;
use crate::analysis::AnalysisResult;
use crate::error::{RigError, SequenceError};
use crate::mass::MassEstimate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Stage {
    #[default]
    AwaitingPlate,
    AwaitingObject,
    AwaitingOscillation,
    AwaitingResults,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AwaitingPlate => "awaiting plate",
            Self::AwaitingObject => "awaiting object",
            Self::AwaitingOscillation => "awaiting oscillation",
            Self::AwaitingResults => "awaiting results",
            Self::Done => "done",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    MeasurePlate,
    MeasureObject,
    Acquire,
    Analyze,
}

impl Step {
    /// The only stage that accepts this step.
    pub fn accepted_in(self) -> Stage {
        match self {
            Self::MeasurePlate => Stage::AwaitingPlate,
            Self::MeasureObject => Stage::AwaitingObject,
            Self::Acquire => Stage::AwaitingOscillation,
            Self::Analyze => Stage::AwaitingResults,
        }
    }

    fn next(self) -> Stage {
        match self {
            Self::MeasurePlate => Stage::AwaitingObject,
            Self::MeasureObject => Stage::AwaitingOscillation,
            Self::Acquire => Stage::AwaitingResults,
            Self::Analyze => Stage::Done,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MeasurePlate => "measure plate",
            Self::MeasureObject => "measure object",
            Self::Acquire => "acquire oscillation",
            Self::Analyze => "analyze",
        })
    }
}

/// What a finished step produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    PlateMass(MassEstimate),
    ObjectMass(MassEstimate),
    Oscillation(Acquisition),
    Results(AnalysisResult),
}

impl Outcome {
    pub fn step(&self) -> Step {
        match self {
            Self::PlateMass(_) => Step::MeasurePlate,
            Self::ObjectMass(_) => Step::MeasureObject,
            Self::Oscillation(_) => Step::Acquire,
            Self::Results(_) => Step::Analyze,
        }
    }
}

/// Permission to run one step, bound to the experiment generation it was issued in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    step: Step,
    generation: u64,
}

impl Ticket {
    pub fn step(&self) -> Step {
        self.step
    }
}

#[derive(Debug, Default)]
pub struct Experiment {
    stage: Stage,
    plate: Option<MassEstimate>,
    object: Option<MassEstimate>,
    oscillation: Option<Acquisition>,
    results: Option<AnalysisResult>,
    generation: u64,
}

impl Experiment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Plate mass, the baseline for the object measurement.
    pub fn baseline(&self) -> Option<&MassEstimate> {
        self.plate.as_ref()
    }

    pub fn object(&self) -> Option<&MassEstimate> {
        self.object.as_ref()
    }

    pub fn oscillation(&self) -> Option<&Acquisition> {
        self.oscillation.as_ref()
    }

    pub fn results(&self) -> Option<&AnalysisResult> {
        self.results.as_ref()
    }

    /// Issue a ticket for `step`, or explain why the current stage refuses it.
    pub fn ticket(&self, step: Step) -> Result<Ticket, SequenceError> {
        if step.accepted_in() == self.stage {
            Ok(Ticket {
                step,
                generation: self.generation,
            })
        } else {
            Err(SequenceError {
                stage: self.stage,
                step,
            })
        }
    }

    /// Record the outcome of a ticketed step and advance one stage.
    pub fn apply(&mut self, ticket: Ticket, outcome: Outcome) -> Result<Stage, RigError> {
        let step = outcome.step();
        let refused = SequenceError {
            stage: self.stage,
            step,
        };
        if ticket.generation != self.generation
            || ticket.step != step
            || step.accepted_in() != self.stage
        {
            return Err(refused.into());
        }
        match outcome {
            Outcome::PlateMass(m) => self.plate = Some(m),
            Outcome::ObjectMass(m) => self.object = Some(m),
            Outcome::Oscillation(a) => self.oscillation = Some(a),
            Outcome::Results(r) => self.results = Some(r),
        }
        let from = self.stage;
        self.stage = step.next();
        info!(from = %from, to = %self.stage, "stage advanced");
        Ok(self.stage)
    }

    /// Back to `AwaitingPlate` with every measurement cleared. Outstanding
    /// tickets become invalid.
    pub fn reset(&mut self) {
        *self = Self {
            generation: self.generation.wrapping_add(1),
            ..Self::default()
        };
        info!("experiment reset");
    }
}
