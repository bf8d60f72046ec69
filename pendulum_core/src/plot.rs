//! Diagnostic plot of the steady-window signal, rendered to SVG.
use std::path::Path;

use svg::Document;
use svg::node::element::{Group, Line, Polyline, Rectangle, Text};

const WIDTH: f64 = 800.0;
const HEIGHT: f64 = 400.0;
const MARGIN: f64 = 50.0;

mod colors {
    pub const SIGNAL: &str = "#0072B2";
    pub const MARKER: &str = "#D55E00";
    pub const AXIS: &str = "#333333";
    pub const ZERO: &str = "#BBBBBB";
}

/// Plot data: the steady-window samples and the steady-window start marker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiagnosticPlot {
    pub times: Vec<f64>,
    pub values: Vec<f64>,
    /// Vertical marker position (s).
    pub marker_s: f64,
    pub title: String,
}

impl DiagnosticPlot {
    pub fn new(times: Vec<f64>, values: Vec<f64>, marker_s: f64) -> Self {
        Self {
            times,
            values,
            marker_s,
            title: "Angular rate, steady window".into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Data bounds `(t_min, t_max, v_min, v_max)`, padded so none is degenerate.
    fn bounds(&self) -> (f64, f64, f64, f64) {
        let fold = |it: &mut dyn Iterator<Item = f64>| {
            it.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            })
        };
        let (mut t0, mut t1) = fold(&mut self.times.iter().copied().chain([self.marker_s]));
        let (mut v0, mut v1) = fold(&mut self.values.iter().copied().chain([0.0]));
        if t1 - t0 <= 0.0 {
            t0 -= 0.5;
            t1 += 0.5;
        }
        if v1 - v0 <= 0.0 {
            v0 -= 1.0;
            v1 += 1.0;
        }
        (t0, t1, v0, v1)
    }

    pub fn to_document(&self) -> Document {
        let (t0, t1, v0, v1) = self.bounds();
        let px = |t: f64| MARGIN + (t - t0) / (t1 - t0) * (WIDTH - 2.0 * MARGIN);
        let py = |v: f64| HEIGHT - MARGIN - (v - v0) / (v1 - v0) * (HEIGHT - 2.0 * MARGIN);

        let points: String = self
            .times
            .iter()
            .zip(&self.values)
            .map(|(&t, &v)| format!("{:.2},{:.2}", px(t), py(v)))
            .collect::<Vec<_>>()
            .join(" ");

        let axes = Group::new()
            .add(
                Rectangle::new()
                    .set("x", MARGIN)
                    .set("y", MARGIN)
                    .set("width", WIDTH - 2.0 * MARGIN)
                    .set("height", HEIGHT - 2.0 * MARGIN)
                    .set("fill", "none")
                    .set("stroke", colors::AXIS),
            )
            .add(
                Line::new()
                    .set("x1", MARGIN)
                    .set("y1", py(0.0))
                    .set("x2", WIDTH - MARGIN)
                    .set("y2", py(0.0))
                    .set("stroke", colors::ZERO)
                    .set("stroke-dasharray", "4 4"),
            )
            .add(
                Text::new(format!("{t0:.1} s"))
                    .set("x", MARGIN)
                    .set("y", HEIGHT - MARGIN + 18.0)
                    .set("font-size", 11),
            )
            .add(
                Text::new(format!("{t1:.1} s"))
                    .set("x", WIDTH - MARGIN)
                    .set("y", HEIGHT - MARGIN + 18.0)
                    .set("font-size", 11)
                    .set("text-anchor", "end"),
            )
            .add(
                Text::new(format!("{v1:.2} deg/s"))
                    .set("x", MARGIN - 4.0)
                    .set("y", MARGIN)
                    .set("font-size", 11)
                    .set("text-anchor", "end"),
            )
            .add(
                Text::new(format!("{v0:.2}"))
                    .set("x", MARGIN - 4.0)
                    .set("y", HEIGHT - MARGIN)
                    .set("font-size", 11)
                    .set("text-anchor", "end"),
            );

        let marker = Line::new()
            .set("id", "steady-start")
            .set("x1", px(self.marker_s))
            .set("y1", MARGIN)
            .set("x2", px(self.marker_s))
            .set("y2", HEIGHT - MARGIN)
            .set("stroke", colors::MARKER)
            .set("stroke-width", 1.5)
            .set("stroke-dasharray", "6 3");

        let trace = Polyline::new()
            .set("id", "signal")
            .set("points", points)
            .set("fill", "none")
            .set("stroke", colors::SIGNAL)
            .set("stroke-width", 1.2)
            .set("stroke-linejoin", "round");

        Document::new()
            .set("width", WIDTH)
            .set("height", HEIGHT)
            .set("viewBox", (0, 0, WIDTH, HEIGHT))
            .add(
                Rectangle::new()
                    .set("width", "100%")
                    .set("height", "100%")
                    .set("fill", "white"),
            )
            .add(axes)
            .add(trace)
            .add(marker)
            .add(
                Text::new(self.title.clone())
                    .set("x", WIDTH / 2.0)
                    .set("y", MARGIN / 2.0)
                    .set("font-size", 14)
                    .set("text-anchor", "middle"),
            )
    }

    pub fn render_svg(&self) -> String {
        self.to_document().to_string()
    }

    /// Write the SVG to `path`, replacing any existing file atomically.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        crate::atomic::write_atomic(path, self.render_svg().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn svg_contains_trace_and_marker() {
        let plot = DiagnosticPlot::new(vec![3.0, 3.5, 4.0], vec![1.0, -1.0, 0.5], 3.0);
        let svg = plot.render_svg();
        assert!(svg.contains("<polyline"));
        assert!(svg.contains("steady-start"));
        assert!(svg.contains("Angular rate"));
    }

    #[test]
    fn empty_plot_still_renders() {
        let plot = DiagnosticPlot::new(vec![], vec![], 3.0);
        assert!(plot.is_empty());
        assert!(plot.render_svg().contains("<svg"));
    }
}
