#![no_main]
use libfuzzer_sys::fuzz_target;
use pendulum_config::{Calibration, CalibrationRow};

fuzz_target!(|rows: Vec<(f64, f64)>| {
    let rows = rows
        .into_iter()
        .map(|(ratio, kg)| CalibrationRow { ratio, kg })
        .collect();
    // Whatever the input, an accepted fit must be usable.
    if let Ok(cal) = Calibration::from_rows(rows) {
        assert!(cal.gain.is_finite() && cal.gain != 0.0);
        assert!(cal.offset.is_finite());
    }
});
