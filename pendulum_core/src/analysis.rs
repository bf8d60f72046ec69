//! Settling time, oscillation period and moment of inertia from one trial.
//!
//! `analyze` never fails: each quantity that cannot be derived is `None`
//! and the others are still reported.
use std::f64::consts::PI;

use tracing::{debug, info, warn};

use crate::config::{AnalysisCfg, RigGeometry};
use crate::fit::{ExpDecay, fit_exp_decay};
use crate::peaks::{enforce_distance, find_peaks, mean_period};
use crate::plot::DiagnosticPlot;
use crate::signal::Signal;

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    /// `settling_time_constants * τ` of the fitted envelope (s).
    pub settling_time_s: Option<f64>,
    pub period_s: Option<f64>,
    /// kg·m²
    pub moment_of_inertia: Option<f64>,
    pub fit: Option<ExpDecay>,
    pub peak_times: Vec<f64>,
    pub steady_samples: usize,
    pub plot: DiagnosticPlot,
}

/// Trifilar-pendulum moment of inertia: `m·R²·T² / (4π²·L)`.
#[inline]
pub fn moment_of_inertia(mass_kg: f64, period_s: f64, geometry: &RigGeometry) -> f64 {
    mass_kg * geometry.radius_m.powi(2) * period_s.powi(2) / (4.0 * PI * PI * geometry.cable_length_m)
}

/// Valid-mode moving average: `len - window + 1` outputs, empty when the
/// input is shorter than the window.
pub fn moving_average(xs: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || xs.len() < window {
        return Vec::new();
    }
    let w = window as f64;
    let mut out = Vec::with_capacity(xs.len() - window + 1);
    let mut sum: f64 = xs[..window].iter().sum();
    out.push(sum / w);
    for i in window..xs.len() {
        sum += xs[i] - xs[i - window];
        out.push(sum / w);
    }
    out
}

pub struct AnalysisEngine {
    cfg: AnalysisCfg,
}

impl AnalysisEngine {
    pub fn new(cfg: AnalysisCfg) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &AnalysisCfg {
        &self.cfg
    }

    pub fn analyze(&self, signal: &Signal, object_mass_kg: f64) -> AnalysisResult {
        let start = self.cfg.steady_start_s();
        let steady = signal.since(start);
        debug!(
            steady_start_s = start,
            samples = steady.len(),
            "steady window selected"
        );

        let fit = self.settling_fit(&steady);
        let settling_time_s = fit
            .map(|f| self.cfg.settling_time_constants * f.tau)
            .filter(|s| s.is_finite() && *s > 0.0);
        if settling_time_s.is_none() {
            warn!(samples = steady.len(), "settling fit did not converge");
        }

        let peaks = find_peaks(steady.values(), self.cfg.peak_height_dps);
        let peaks = enforce_distance(
            &peaks,
            steady.times(),
            steady.values(),
            self.cfg.peak_min_distance_s,
        );
        let peak_times: Vec<f64> = peaks.iter().map(|&i| steady.times()[i]).collect();
        let period_s = mean_period(&peak_times);
        if period_s.is_none() {
            warn!(peaks = peak_times.len(), "not enough peaks for a period");
        }

        let moment_of_inertia = period_s
            .map(|p| moment_of_inertia(object_mass_kg, p, &self.cfg.geometry))
            .filter(|v| v.is_finite());

        info!(
            settling_time_s = ?settling_time_s,
            period_s = ?period_s,
            moment_of_inertia = ?moment_of_inertia,
            "analysis complete"
        );

        AnalysisResult {
            settling_time_s,
            period_s,
            moment_of_inertia,
            fit,
            peak_times,
            steady_samples: steady.len(),
            plot: DiagnosticPlot::new(steady.times().to_vec(), steady.values().to_vec(), start),
        }
    }

    /// Fit the smoothed |rate| envelope. Each smoothed value is placed at the
    /// mean time of its window so both series have the same length.
    fn settling_fit(&self, steady: &Signal) -> Option<ExpDecay> {
        let w = self.cfg.smoothing_window;
        let magnitude: Vec<f64> = steady.values().iter().map(|v| v.abs()).collect();
        let envelope = moving_average(&magnitude, w);
        let centers = moving_average(steady.times(), w);
        fit_exp_decay(&centers, &envelope, self.cfg.max_fit_evals)
    }
}
