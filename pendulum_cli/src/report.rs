//! Experiment results for people (kg/lb, "N/A") and for machines (JSON).

use pendulum_core::acquisition::AcquisitionStats;
use pendulum_core::{AnalysisResult, MassEstimate};
use serde_json::{Value, json};

/// Everything one experiment produced; absent parts are `None`.
#[derive(Debug, Default, Clone)]
pub struct Report<'a> {
    pub plate: Option<&'a MassEstimate>,
    pub object: Option<&'a MassEstimate>,
    pub acquisition: Option<&'a AcquisitionStats>,
    pub results: Option<&'a AnalysisResult>,
    pub plot_path: Option<&'a std::path::Path>,
    pub signal_path: Option<&'a std::path::Path>,
}

fn or_na(v: Option<f64>, fmt: impl Fn(f64) -> String) -> String {
    v.map_or_else(|| "N/A".to_string(), fmt)
}

fn mass_line(label: &str, m: Option<&MassEstimate>) -> String {
    match m {
        Some(m) => format!("{label}: {:.3} kg ({:.3} lb)", m.kg, m.lb()),
        None => format!("{label}: N/A"),
    }
}

impl Report<'_> {
    pub fn render_human(&self) -> String {
        let r = self.results;
        let mut lines = vec![
            mass_line("Plate mass", self.plate),
            mass_line("Object mass", self.object),
        ];
        if let Some(a) = self.acquisition {
            lines.push(format!(
                "Samples: {} ({} skipped), {:.1} Hz effective, max gap {:.3} s",
                a.samples, a.faults, a.effective_rate_hz, a.max_gap_s
            ));
        }
        lines.push(format!(
            "Settling time: {}",
            or_na(r.and_then(|r| r.settling_time_s), |s| format!("{s:.2} s"))
        ));
        lines.push(format!(
            "Period: {}",
            or_na(r.and_then(|r| r.period_s), |p| format!("{p:.3} s"))
        ));
        lines.push(format!(
            "Moment of inertia: {}",
            or_na(r.and_then(|r| r.moment_of_inertia), |i| format!("{i:.5} kg·m²"))
        ));
        if let Some(p) = self.plot_path {
            lines.push(format!("Plot: {}", p.display()));
        }
        if let Some(p) = self.signal_path {
            lines.push(format!("Signal: {}", p.display()));
        }
        lines.join("\n")
    }

    pub fn to_json(&self) -> Value {
        let mass = |m: Option<&MassEstimate>| {
            m.map_or(Value::Null, |m| {
                json!({
                    "kg": m.kg,
                    "lb": m.lb(),
                    "samples": m.samples,
                    "channels": m.channels,
                })
            })
        };
        let acquisition = self.acquisition.map_or(Value::Null, |a| {
            json!({
                "samples": a.samples,
                "faults": a.faults,
                "zero_offset_dps": a.zero_offset_dps,
                "trigger_at_s": a.trigger_at_s,
                "effective_rate_hz": a.effective_rate_hz,
                "max_gap_s": a.max_gap_s,
            })
        });
        let r = self.results;
        json!({
            "plate": mass(self.plate),
            "object": mass(self.object),
            "acquisition": acquisition,
            "settling_time_s": r.and_then(|r| r.settling_time_s),
            "period_s": r.and_then(|r| r.period_s),
            "moment_of_inertia": r.and_then(|r| r.moment_of_inertia),
            "peak_times": r.map(|r| r.peak_times.clone()).unwrap_or_default(),
            "tau_s": r.and_then(|r| r.fit).map(|f| f.tau),
            "plot": self.plot_path.map(|p| p.display().to_string()),
            "signal": self.signal_path.map(|p| p.display().to_string()),
        })
    }
}
