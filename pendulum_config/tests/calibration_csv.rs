use std::fs::File;
use std::io::Write;

use pendulum_config::{Calibration, CalibrationRow, load_calibration_csv};
use rstest::rstest;
use tempfile::tempdir;

const GAIN: f64 = 3.3508e4;
const ZERO: f64 = -1.5682e-5;

fn ratio_for(kg: f64) -> f64 {
    ZERO + kg / GAIN
}

#[rstest]
fn calibration_from_rows_two_points() {
    // Exact two-point fit
    let rows = vec![
        CalibrationRow {
            ratio: ratio_for(0.0),
            kg: 0.0,
        },
        CalibrationRow {
            ratio: ratio_for(2.0),
            kg: 2.0,
        },
    ];
    let c = Calibration::from_rows(rows).unwrap();
    assert!((c.gain - GAIN).abs() / GAIN < 1e-6);
    assert!((c.offset - ZERO).abs() < 1e-10);
}

#[rstest]
fn calibration_from_rows_three_points_ols() {
    let rows: Vec<CalibrationRow> = [0.0, 0.5, 1.0]
        .iter()
        .map(|&kg| CalibrationRow {
            ratio: ratio_for(kg),
            kg,
        })
        .collect();
    let c = Calibration::from_rows(rows).unwrap();
    assert!((c.gain - GAIN).abs() / GAIN < 1e-6);
    assert!((c.offset - ZERO).abs() < 1e-10);
}

#[rstest]
fn calibration_rejects_duplicate_ratio() {
    let rows = vec![
        CalibrationRow {
            ratio: 1e-5,
            kg: 0.0,
        },
        CalibrationRow {
            ratio: 1e-5,
            kg: 1.0,
        },
    ];
    let err = Calibration::from_rows(rows).expect_err("should fail on duplicate ratio");
    assert!(format!("{err}").to_lowercase().contains("duplicate ratio"));
}

#[rstest]
fn calibration_rejects_non_monotonic_zigzag() {
    let rows = vec![
        CalibrationRow {
            ratio: ratio_for(0.0),
            kg: 0.0,
        },
        CalibrationRow {
            ratio: ratio_for(2.0),
            kg: 2.0,
        },
        CalibrationRow {
            ratio: ratio_for(1.0),
            kg: 1.0,
        },
    ];
    let err = Calibration::from_rows(rows).expect_err("should fail on non-monotonic ratio");
    assert!(
        format!("{err}")
            .to_lowercase()
            .contains("monotonic (strictly increasing or strictly decreasing)")
    );
}

#[rstest]
fn calibration_rejects_single_row() {
    let rows = vec![CalibrationRow { ratio: 0.0, kg: 0.0 }];
    let err = Calibration::from_rows(rows).expect_err("one row cannot define a line");
    assert!(format!("{err}").contains("at least two rows"));
}

#[rstest]
fn csv_with_wrong_headers_errors() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad_headers.csv");

    let mut f = File::create(&path).unwrap();
    writeln!(f, "raw,value").unwrap();
    writeln!(f, "100,0.0").unwrap();
    writeln!(f, "200,1.0").unwrap();

    let err = load_calibration_csv(&path).expect_err("should error on bad headers");
    assert!(format!("{err}").contains("headers 'ratio,kg'"));
}

#[rstest]
fn csv_with_non_numeric_errors() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad_numeric.csv");

    let mut f = File::create(&path).unwrap();
    writeln!(f, "ratio,kg").unwrap();
    writeln!(f, "abc,xyz").unwrap();

    let err = load_calibration_csv(&path).expect_err("should error on non-numeric");
    assert!(format!("{err}").contains("invalid CSV row"));
}

#[rstest]
fn csv_round_trips_reference_loads() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cal.csv");

    let mut f = File::create(&path).unwrap();
    writeln!(f, "ratio,kg").unwrap();
    for kg in [0.0, 1.0, 2.0, 5.0] {
        writeln!(f, "{:e},{}", ratio_for(kg), kg).unwrap();
    }
    drop(f);

    let c = load_calibration_csv(&path).unwrap();
    assert!((c.gain - GAIN).abs() / GAIN < 1e-6);
    assert!((c.offset - ZERO).abs() < 1e-10);
}

#[rstest]
fn calibration_with_noise_and_outliers_recovers_params() {
    let mut rows = Vec::new();
    for i in 0..50 {
        let kg = f64::from(i) * 0.2;
        // bounded pseudo-noise of +-5 g
        let noise = (f64::from(i) * 37.0).sin() * 0.005;
        rows.push(CalibrationRow {
            ratio: ratio_for(kg),
            kg: kg + noise,
        });
    }
    // Strong outliers (> 2σ) replacing in-range points keep ratios monotonic
    rows[15].kg = 40.0;
    rows[35].kg = -40.0;

    let c = Calibration::from_rows(rows).unwrap();
    let rel_err_gain = (c.gain - GAIN).abs() / GAIN;
    assert!(rel_err_gain <= 0.01, "gain rel err {rel_err_gain}");
    // zero-load ratio within 1 g of load
    assert!((c.offset - ZERO).abs() * GAIN < 0.01, "offset {}", c.offset);
}

#[rstest]
fn calibration_horizontal_line_errors() {
    let rows: Vec<CalibrationRow> = [0.0, 1.0, 2.0]
        .iter()
        .map(|&kg| CalibrationRow {
            ratio: ratio_for(kg),
            kg: 1.0,
        })
        .collect();
    let err = Calibration::from_rows(rows).expect_err("should fail on zero slope (horizontal)");
    assert!(
        format!("{err}").to_lowercase().contains("zero gain"),
        "Expected error about zero gain, got: {err}"
    );
}
