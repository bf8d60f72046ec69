//! Common time/unit helpers for pendulum_core.

/// Number of microseconds in one second.
pub const MICROS_PER_SEC: u64 = 1_000_000;

/// Pounds per kilogram, as printed on the results surface.
pub const LB_PER_KG: f64 = 2.205;

/// Compute the sampling period for a rate in Hz.
/// - Non-finite or non-positive rates fall back to 1 Hz.
/// - Ensures result is at least 1 microsecond.
#[inline]
pub fn period(hz: f64) -> std::time::Duration {
    let hz = if hz.is_finite() && hz > 0.0 { hz } else { 1.0 };
    let us = (MICROS_PER_SEC as f64 / hz).round().max(1.0);
    std::time::Duration::from_micros(us as u64)
}

#[inline]
pub fn kg_to_lb(kg: f64) -> f64 {
    kg * LB_PER_KG
}

/// Arithmetic mean; `None` for an empty slice.
#[inline]
pub fn mean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        None
    } else {
        Some(xs.iter().sum::<f64>() / xs.len() as f64)
    }
}
