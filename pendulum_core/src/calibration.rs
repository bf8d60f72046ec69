//! Linear ratio-to-kilogram model for a single load cell.

use crate::error::BuildError;

/// `kg = (ratio - offset) * gain`, fixed for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationModel {
    gain: f64,
    offset: f64,
}

impl CalibrationModel {
    pub fn new(gain: f64, offset: f64) -> Result<Self, BuildError> {
        if !gain.is_finite() || gain == 0.0 {
            return Err(BuildError::InvalidGain);
        }
        if !offset.is_finite() {
            return Err(BuildError::InvalidOffset);
        }
        Ok(Self { gain, offset })
    }

    #[inline]
    pub fn gain(&self) -> f64 {
        self.gain
    }

    #[inline]
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Convert one raw bridge ratio to kilograms carried by that cell.
    #[inline]
    pub fn apply(&self, ratio: f64) -> f64 {
        (ratio - self.offset) * self.gain
    }
}

impl Default for CalibrationModel {
    /// Constants of the rig's original load-cell calibration.
    fn default() -> Self {
        Self {
            gain: 3.3508e4,
            offset: -1.5682e-5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_gain() {
        assert_eq!(
            CalibrationModel::new(0.0, 0.0),
            Err(BuildError::InvalidGain)
        );
        assert_eq!(
            CalibrationModel::new(f64::NAN, 0.0),
            Err(BuildError::InvalidGain)
        );
        assert_eq!(
            CalibrationModel::new(1.0, f64::INFINITY),
            Err(BuildError::InvalidOffset)
        );
    }

    #[test]
    fn zero_load_ratio_maps_to_zero() {
        let c = CalibrationModel::default();
        assert!(c.apply(c.offset()).abs() < 1e-12);
        assert!((c.apply(c.offset() + 1.0 / c.gain()) - 1.0).abs() < 1e-9);
    }
}
