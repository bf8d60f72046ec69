//! Device implementations behind the `pendulum_traits` boundary.
//!
//! - `sim`: a self-consistent simulated rig (always available)
//! - `gpio`: Raspberry Pi outputs for the release mechanism (`hardware` feature)
pub mod error;
pub mod sim;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;

pub use error::HwError;
pub use sim::{SimParams, SimRig};
