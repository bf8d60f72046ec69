//! Time-stamped angular-rate samples from one oscillation trial.
use crate::error::RigError;

/// Parallel `times` (s, from the start of acquisition) and `values` (deg/s).
///
/// Times are non-negative and strictly increasing; both vectors always have
/// the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signal {
    times: Vec<f64>,
    values: Vec<f64>,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            times: Vec::with_capacity(n),
            values: Vec::with_capacity(n),
        }
    }

    /// Build from parallel vectors, checking every invariant.
    pub fn from_parts(times: Vec<f64>, values: Vec<f64>) -> Result<Self, RigError> {
        if times.len() != values.len() {
            return Err(RigError::InsufficientData(format!(
                "signal has {} times but {} values",
                times.len(),
                values.len()
            )));
        }
        let mut s = Self::with_capacity(times.len());
        for (t, v) in times.into_iter().zip(values) {
            s.push(t, v)?;
        }
        Ok(s)
    }

    /// Append a sample; rejects non-finite data and times that do not advance.
    pub fn push(&mut self, t: f64, value: f64) -> Result<(), RigError> {
        if !t.is_finite() || t < 0.0 || !value.is_finite() {
            return Err(RigError::InsufficientData(format!(
                "invalid sample ({t}, {value})"
            )));
        }
        if let Some(&last) = self.times.last() {
            if t <= last {
                return Err(RigError::InsufficientData(format!(
                    "sample time {t} does not follow {last}"
                )));
            }
        }
        self.times.push(t);
        self.values.push(value);
        Ok(())
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.times.iter().copied().zip(self.values.iter().copied())
    }

    /// Samples with `t >= start`, as a new signal.
    pub fn since(&self, start: f64) -> Self {
        let first = self.times.partition_point(|&t| t < start);
        Self {
            times: self.times[first..].to_vec(),
            values: self.values[first..].to_vec(),
        }
    }

    /// Seconds covered from the first to the last sample.
    pub fn span(&self) -> f64 {
        match (self.times.first(), self.times.last()) {
            (Some(a), Some(b)) => b - a,
            _ => 0.0,
        }
    }
}
