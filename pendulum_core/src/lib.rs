#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Torsion-pendulum measurement pipeline (hardware-agnostic).
//!
//! All device access goes through the `pendulum_traits` boundary, and all
//! timing through `pendulum_traits::Clock`, so the whole pipeline runs
//! against the simulated rig with a manual clock in tests.
//!
//! ## Architecture
//!
//! - **Calibration**: linear ratio→kg model (`calibration`)
//! - **Mass**: plate and object mass from the force bridge (`mass`)
//! - **Trigger**: one-shot release sequence (`trigger`)
//! - **Acquisition**: fixed-rate gyro sampling with the trigger inside the window (`acquisition`)
//! - **Analysis**: settling fit, peaks, period, moment of inertia, plot
//!   (`analysis`, `fit`, `peaks`, `plot`)
//! - **Orchestration**: stage machine (`orchestrator`) and background worker (`session`)

pub mod acquisition;
pub mod analysis;
pub mod atomic;
pub mod calibration;
pub mod cancel;
pub mod config;
pub mod conversions;
pub mod error;
pub mod fit;
pub mod hw_error;
pub mod mass;
pub mod orchestrator;
pub mod peaks;
pub mod plot;
pub mod session;
pub mod signal;
pub mod trigger;
pub mod util;

pub use acquisition::{Acquisition, AcquisitionLoop, AcquisitionStats};
pub use analysis::{AnalysisEngine, AnalysisResult, moment_of_inertia};
pub use calibration::CalibrationModel;
pub use cancel::CancelToken;
pub use config::{AcquisitionCfg, AnalysisCfg, MassCfg, RigGeometry, TriggerCfg};
pub use error::{BuildError, Report, Result, RigError, SequenceError};
pub use mass::{MassEstimate, MassEstimator};
pub use orchestrator::{Experiment, Outcome, Stage, Step, Ticket};
pub use plot::DiagnosticPlot;
pub use session::{Components, Session};
pub use signal::Signal;
pub use trigger::TriggerSequencer;
