use thiserror::Error;

use crate::orchestrator::{Stage, Step};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RigError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware unavailable: {0}")]
    HardwareUnavailable(String),
    #[error("insufficient data: {0}")]
    InsufficientData(String),
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    #[error("a measurement is already in progress")]
    Busy,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("timeout waiting for sensor")]
    Timeout,
    #[error("cancelled")]
    Cancelled,
    #[error("worker failed: {0}")]
    Worker(String),
}

/// An experiment step requested from a stage that does not accept it.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("cannot {step} while {stage}")]
pub struct SequenceError {
    pub stage: Stage,
    pub step: Step,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("calibration gain must be finite and non-zero")]
    InvalidGain,
    #[error("calibration offset must be finite")]
    InvalidOffset,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
