//! Maps `Box<dyn Error>` from trait boundaries to typed `RigError`.
//!
//! The traits in `pendulum_traits` use `Box<dyn Error + Send + Sync>` so any
//! device backend can plug in; this module converts those to our typed error
//! enum, with an optional feature-gated path for `pendulum_hardware::HwError`
//! downcasting.

use crate::error::RigError;

/// Map a trait-boundary error to a typed `RigError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> RigError {
    #[cfg(feature = "hardware-errors")]
    {
        use pendulum_hardware::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout => RigError::Timeout,
                HwError::NotAttached { .. } => RigError::HardwareUnavailable(hw.to_string()),
                other => RigError::Hardware(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        RigError::Timeout
    } else if lower.contains("attach") {
        RigError::HardwareUnavailable(s)
    } else {
        RigError::Hardware(s)
    }
}

/// Shorthand for `map_err` at trait call sites.
pub(crate) fn boxed(e: Box<dyn std::error::Error + Send + Sync>) -> eyre::Report {
    eyre::Report::new(map_hw_error(e.as_ref()))
}
