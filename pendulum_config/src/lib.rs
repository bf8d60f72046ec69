#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and calibration parsing for the pendulum rig.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//!   Every section is optional; omitted keys take the rig's built-in values.
//! - Calibration CSV loader enforces headers and performs a robust refit
//!   to reduce outlier influence before gain/offset estimation.
use serde::Deserialize;

/// Calibration CSV schema: one row per reference load on a single cell.
///
/// Expected headers:
/// ratio,kg
///
/// Example:
/// ratio,kg
/// -0.0000157,0.0
/// 0.0000141,1.0
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct CalibrationRow {
    pub ratio: f64,
    pub kg: f64,
}

/// Suspension geometry.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RigCfg {
    /// Radius of the suspension attachment circle (m)
    pub radius_m: f64,
    /// Length of the suspension cables (m)
    pub cable_length_m: f64,
}

impl Default for RigCfg {
    fn default() -> Self {
        Self {
            radius_m: 0.4572,
            cable_length_m: 1.5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ForceCfg {
    /// Bridge device serial number
    pub serial_number: u32,
    /// Number of load cells supporting the plate
    pub channels: u32,
    /// kg per unit voltage ratio
    pub gain: f64,
    /// Voltage ratio at zero load
    pub offset: f64,
    pub attach_timeout_ms: u64,
    /// Wait after opening channels before the first sample
    pub settle_ms: u64,
    pub samples: u32,
    pub sample_interval_ms: u64,
}

impl Default for ForceCfg {
    fn default() -> Self {
        Self {
            serial_number: 716_326,
            channels: 3,
            gain: 3.3508e4,
            offset: -1.5682e-5,
            attach_timeout_ms: 5000,
            settle_ms: 2000,
            samples: 20,
            sample_interval_ms: 100,
        }
    }
}

/// Release mechanism timing. Pulse counts are a contract with the mechanics.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TriggerCfg {
    pub hold_settle_ms: u64,
    pub release_settle_ms: u64,
    pub half_period_us: u64,
    pub preload_steps: u32,
    pub release_steps: u32,
    pub return_steps: u32,
}

impl Default for TriggerCfg {
    fn default() -> Self {
        Self {
            hold_settle_ms: 1000,
            release_settle_ms: 1000,
            half_period_us: 1500,
            preload_steps: 120,
            release_steps: 300,
            return_steps: 180,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AcquisitionCfg {
    pub duration_s: f64,
    pub sample_rate_hz: f64,
    /// Offset inside the window at which the release sequence starts
    pub trigger_at_s: f64,
}

impl Default for AcquisitionCfg {
    fn default() -> Self {
        Self {
            duration_s: 30.0,
            sample_rate_hz: 100.0,
            trigger_at_s: 1.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AnalysisCfg {
    /// Samples earlier than trigger_at_s + steady_delay_s are discarded
    pub steady_delay_s: f64,
    pub smoothing_window: usize,
    pub peak_height_dps: f64,
    /// Drop peaks closer than this to a higher one; 0 disables (s)
    pub peak_min_distance_s: f64,
    pub max_fit_evals: usize,
    /// Settling time = this many decay time constants
    pub settling_time_constants: f64,
}

impl Default for AnalysisCfg {
    fn default() -> Self {
        Self {
            steady_delay_s: 2.0,
            smoothing_window: 10,
            peak_height_dps: 0.1,
            peak_min_distance_s: 0.0,
            max_fit_evals: 10_000,
            settling_time_constants: 4.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Pins {
    pub step: u8,
    pub dir: u8,
    pub magnets: Vec<u8>,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            step: 18,
            dir: 23,
            magnets: vec![5, 6, 13],
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Physical model driven by the simulated backend.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimulationCfg {
    pub plate_kg: f64,
    pub object_kg: f64,
    pub period_s: f64,
    pub tau_s: f64,
    pub amplitude_dps: f64,
    pub noise_dps: f64,
    pub gyro_bias_dps: f64,
    pub failed_channels: Vec<u32>,
}

impl Default for SimulationCfg {
    fn default() -> Self {
        Self {
            plate_kg: 4.2,
            object_kg: 1.0,
            period_s: 3.0,
            tau_s: 2.0,
            amplitude_dps: 40.0,
            noise_dps: 0.0,
            gyro_bias_dps: 0.35,
            failed_channels: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub rig: RigCfg,
    pub force: ForceCfg,
    pub trigger: TriggerCfg,
    pub acquisition: AcquisitionCfg,
    pub analysis: AnalysisCfg,
    pub pins: Pins,
    pub logging: Logging,
    pub simulation: SimulationCfg,
}

/// Longest single acquisition window the rig will record (one hour).
pub const MAX_ACQUISITION_S: f64 = 3600.0;

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Linear model for one load cell: kg = (ratio - offset) * gain.
#[derive(Debug, Clone, Copy)]
pub struct Calibration {
    pub gain: f64,
    pub offset: f64,
}

impl Calibration {
    /// Build Calibration from reference rows using ordinary least squares on all points.
    /// Fits kg = a*ratio + b, then converts to kg = a*(ratio - offset),
    /// where offset = -b/a is the zero-load ratio.
    pub fn from_rows(rows: Vec<CalibrationRow>) -> eyre::Result<Self> {
        if rows.len() < 2 {
            eyre::bail!("calibration requires at least two rows, got {}", rows.len());
        }
        if let Some(i) = rows
            .iter()
            .position(|r| !r.ratio.is_finite() || !r.kg.is_finite())
        {
            eyre::bail!("calibration row {} is not finite", i);
        }

        // Strictly monotonic ratios (increasing or decreasing), no duplicates
        let mut dir: i8 = 0;
        for i in 1..rows.len() {
            let d = rows[i].ratio - rows[i - 1].ratio;
            if d == 0.0 {
                eyre::bail!(
                    "calibration rows have duplicate ratio values at index {} and {}",
                    i - 1,
                    i
                );
            }
            let step_dir = if d > 0.0 { 1 } else { -1 };
            if dir == 0 {
                dir = step_dir;
            } else if dir != step_dir {
                eyre::bail!(
                    "calibration ratios must be monotonic (strictly increasing or strictly decreasing)"
                );
            }
        }

        let pts: Vec<(f64, f64)> = rows.iter().map(|r| (r.ratio, r.kg)).collect();
        let (a0, b0) = ols(&pts)?;

        // RMS of residuals around the initial line
        let sumsq: f64 = pts
            .iter()
            .map(|(x, y)| {
                let r = y - (a0 * x + b0);
                r * r
            })
            .sum();
        let rms = (sumsq / pts.len() as f64).sqrt();

        // Reject outliers with |residual| > 2σ and refit if at least 2 remain.
        let (a, b) = robust_refit(&pts, a0, b0, rms, 2.0).unwrap_or((a0, b0));

        let offset = -b / a;
        if !offset.is_finite() {
            eyre::bail!("calibration produced invalid zero-load ratio");
        }
        Ok(Calibration { gain: a, offset })
    }
}

/// Least-squares line through `pts`; rejects degenerate or zero slopes.
fn ols(pts: &[(f64, f64)]) -> eyre::Result<(f64, f64)> {
    let n = pts.len() as f64;
    let mean_x = pts.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pts.iter().map(|p| p.1).sum::<f64>() / n;
    let mut sxx = 0.0f64;
    let mut sxy = 0.0f64;
    for (px, py) in pts {
        let x = px - mean_x;
        sxx += x * x;
        sxy += x * (py - mean_y);
    }
    if !sxx.is_finite() || sxx == 0.0 {
        eyre::bail!("calibration cannot determine slope (degenerate ratio variance)");
    }
    let a = sxy / sxx;
    if !a.is_finite() {
        eyre::bail!("calibration produced non-finite gain");
    }
    if a == 0.0 {
        eyre::bail!("calibration produced zero gain");
    }
    Ok((a, mean_y - a * mean_x))
}

/// Single-step robust refit: drop points with |residual| > k * rms around
/// y = a0*x + b0 and refit the inliers. Returns None when nothing was
/// rejected, fewer than 2 inliers remain, or the refit degenerates; the caller
/// keeps (a0, b0) in that case.
fn robust_refit(pts: &[(f64, f64)], a0: f64, b0: f64, rms: f64, k: f64) -> Option<(f64, f64)> {
    if !(rms.is_finite() && rms > 0.0 && k.is_finite() && k > 0.0) {
        return None;
    }
    let thr = k * rms;
    let inliers: Vec<(f64, f64)> = pts
        .iter()
        .copied()
        .filter(|(x, y)| (y - (a0 * x + b0)).abs() <= thr)
        .collect();
    if inliers.len() >= 2 && inliers.len() < pts.len() {
        ols(&inliers).ok()
    } else {
        None
    }
}

impl TryFrom<Vec<CalibrationRow>> for Calibration {
    type Error = eyre::Report;
    fn try_from(rows: Vec<CalibrationRow>) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

pub fn load_calibration_csv(path: &std::path::Path) -> eyre::Result<Calibration> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open calibration CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["ratio", "kg"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "calibration CSV must have headers 'ratio,kg', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<CalibrationRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }

    Calibration::try_from(rows)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Rig geometry
        if !(self.rig.radius_m > 0.0 && self.rig.radius_m.is_finite()) {
            eyre::bail!("rig.radius_m must be > 0");
        }
        if !(self.rig.cable_length_m > 0.0 && self.rig.cable_length_m.is_finite()) {
            eyre::bail!("rig.cable_length_m must be > 0");
        }

        // Force
        if self.force.channels == 0 {
            eyre::bail!("force.channels must be >= 1");
        }
        if self.force.gain == 0.0 || !self.force.gain.is_finite() {
            eyre::bail!("force.gain must be finite and non-zero");
        }
        if !self.force.offset.is_finite() {
            eyre::bail!("force.offset must be finite");
        }
        if self.force.samples == 0 {
            eyre::bail!("force.samples must be >= 1");
        }
        if self.force.attach_timeout_ms == 0 {
            eyre::bail!("force.attach_timeout_ms must be >= 1");
        }

        // Trigger
        if self.trigger.half_period_us == 0 {
            eyre::bail!("trigger.half_period_us must be >= 1");
        }

        // Acquisition
        let acq = &self.acquisition;
        if !(acq.sample_rate_hz > 0.0 && acq.sample_rate_hz.is_finite()) {
            eyre::bail!("acquisition.sample_rate_hz must be > 0");
        }
        if acq.sample_rate_hz > 10_000.0 {
            eyre::bail!("acquisition.sample_rate_hz is unreasonably large (>10kHz)");
        }
        if !(acq.duration_s > 0.0 && acq.duration_s.is_finite()) {
            eyre::bail!("acquisition.duration_s must be > 0");
        }
        if acq.duration_s > MAX_ACQUISITION_S {
            eyre::bail!("acquisition.duration_s must be <= {MAX_ACQUISITION_S} s");
        }
        if acq.trigger_at_s < 0.0 || acq.trigger_at_s >= acq.duration_s {
            eyre::bail!("acquisition.trigger_at_s must be in [0, duration_s)");
        }

        // Analysis
        let an = &self.analysis;
        if an.steady_delay_s < 0.0 || !an.steady_delay_s.is_finite() {
            eyre::bail!("analysis.steady_delay_s must be >= 0");
        }
        if acq.trigger_at_s + an.steady_delay_s >= acq.duration_s {
            eyre::bail!("analysis.steady_delay_s leaves no samples inside the acquisition window");
        }
        if an.smoothing_window == 0 {
            eyre::bail!("analysis.smoothing_window must be >= 1");
        }
        if an.peak_height_dps < 0.0 || !an.peak_height_dps.is_finite() {
            eyre::bail!("analysis.peak_height_dps must be >= 0");
        }
        if an.peak_min_distance_s < 0.0 || !an.peak_min_distance_s.is_finite() {
            eyre::bail!("analysis.peak_min_distance_s must be >= 0");
        }
        if an.max_fit_evals == 0 {
            eyre::bail!("analysis.max_fit_evals must be >= 1");
        }
        if !(an.settling_time_constants > 0.0 && an.settling_time_constants.is_finite()) {
            eyre::bail!("analysis.settling_time_constants must be > 0");
        }

        // Pins
        if self.pins.magnets.is_empty() {
            eyre::bail!("pins.magnets must list at least one output");
        }

        // Simulation
        let sim = &self.simulation;
        if !(sim.period_s > 0.0 && sim.tau_s > 0.0) {
            eyre::bail!("simulation.period_s and simulation.tau_s must be > 0");
        }

        Ok(())
    }
}
