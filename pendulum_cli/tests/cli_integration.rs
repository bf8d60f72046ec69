use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{TempDir, tempdir};

// Sim config with a short window and fast sequencing so a full run takes
// a few seconds of wall time.
const FAST: &str = r#"
[force]
settle_ms = 10
samples = 3
sample_interval_ms = 5
attach_timeout_ms = 50

[trigger]
hold_settle_ms = 10
release_settle_ms = 10
half_period_us = 50
preload_steps = 4
release_steps = 10
return_steps = 6

[acquisition]
duration_s = 2.5
sample_rate_hz = 100
trigger_at_s = 0.1

[analysis]
steady_delay_s = 0.2
peak_height_dps = 0.5

[simulation]
period_s = 0.5
tau_s = 0.6
amplitude_dps = 40.0
"#;

fn write_config(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("cfg.toml");
    fs::write(&path, FAST).unwrap();
    path
}

/// Same as [`write_config`] with extra keys added to `[simulation]`.
fn write_sim_config(dir: &TempDir, sim_keys: &str) -> PathBuf {
    let path = dir.path().join("cfg.toml");
    fs::write(&path, FAST.replace("[simulation]", &format!("[simulation]\n{sim_keys}"))).unwrap();
    path
}

fn pendulum(cfg: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pendulum").unwrap();
    cmd.arg("--log-level").arg("warn").arg("--config").arg(cfg);
    cmd
}

#[rstest]
#[case(&["--help"], 0, "self-check", "stdout")]
#[case(&["trigger", "--yes"], 0, "Release sequence complete", "stdout")]
#[case(&["self-check"], 0, "OK: 3/3 bridge channels", "stdout")]
#[case(&["analyze", "missing.csv", "--object-kg", "0"], 1, "positive mass", "stderr")]
#[case(&["analyze"], 2, "required", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    let assert = pendulum(&cfg).args(args).assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[test]
fn full_run_reports_masses_and_period() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    let plot = dir.path().join("out/plot.svg");
    let signal = dir.path().join("out/signal.csv");

    let out = pendulum(&cfg)
        .arg("--json")
        .arg("run")
        .arg("--yes")
        .arg("--plot")
        .arg(&plot)
        .arg("--save-signal")
        .arg(&signal)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8_lossy(&out);
    let v: serde_json::Value = serde_json::from_str(stdout.trim()).expect("one JSON report");

    let plate = v["plate"]["kg"].as_f64().unwrap();
    let object = v["object"]["kg"].as_f64().unwrap();
    assert!((plate - 4.2).abs() < 1e-6, "plate {plate}");
    assert!((object - 1.0).abs() < 1e-6, "object {object}");
    assert!((v["object"]["lb"].as_f64().unwrap() - 2.205).abs() < 1e-6);

    let period = v["period_s"].as_f64().expect("period");
    assert!((period - 0.5).abs() < 0.02, "period {period}");
    let moi = v["moment_of_inertia"].as_f64().expect("moi");
    let expected = 0.4572f64.powi(2) * 0.25 / (4.0 * std::f64::consts::PI.powi(2) * 1.5);
    assert!((moi / expected - 1.0).abs() < 0.1, "moi {moi} vs {expected}");
    assert!(v["acquisition"]["samples"].as_u64().unwrap() > 100);

    assert!(fs::read_to_string(&plot).unwrap().contains("<svg"));
    assert!(
        fs::read_to_string(&signal)
            .unwrap()
            .starts_with("time_s,rate_dps")
    );

    // The saved signal re-analyzes to the same period.
    let out = pendulum(&cfg)
        .arg("--json")
        .arg("analyze")
        .arg(&signal)
        .arg("--object-kg")
        .arg("1.0")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let again: serde_json::Value = serde_json::from_slice(&out).unwrap();
    let reanalyzed = again["period_s"].as_f64().unwrap();
    assert!((reanalyzed - period).abs() < 1e-4, "{reanalyzed} vs {period}");
}

#[test]
fn human_report_lists_every_quantity() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    pendulum(&cfg)
        .arg("run")
        .arg("--yes")
        .assert()
        .success()
        .stdout(predicate::str::contains("Plate mass: 4.200 kg (9.261 lb)"))
        .stdout(predicate::str::contains("Object mass: 1.000 kg"))
        .stdout(predicate::str::contains("Settling time:"))
        .stdout(predicate::str::contains("Period: 0."))
        .stdout(predicate::str::contains("Moment of inertia:"));
}

#[test]
fn no_attached_channel_is_hardware_unavailable() {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(&dir, "failed_channels = [0, 1, 2]");

    pendulum(&cfg)
        .arg("self-check")
        .assert()
        .code(4)
        .stderr(predicate::str::contains("No usable force-bridge channel"));

    let out = pendulum(&cfg)
        .arg("--json")
        .arg("run")
        .arg("--yes")
        .assert()
        .code(4)
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(v["reason"], "HardwareUnavailable");
}

#[test]
fn partial_channel_failure_still_measures() {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(&dir, "failed_channels = [1]");

    pendulum(&cfg)
        .arg("self-check")
        .assert()
        .success()
        .stdout(predicate::str::contains("OK: 2/3 bridge channels"));
}

#[rstest]
#[case("[acquisition]\nsample_rate_hz = 0", "sample_rate_hz")]
#[case("[analysis]\nsmoothing_window = 0", "smoothing_window")]
fn invalid_config_exits_with_config_code(#[case] body: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, body).unwrap();
    pendulum(&path)
        .arg("self-check")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid configuration"))
        .stderr(predicate::str::contains(needle));
}

#[test]
fn calibrate_prints_force_snippet() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    let csv = dir.path().join("cal.csv");
    fs::write(&csv, "ratio,kg\n0.0001,2.0\n0.0002,5.3508\n0.0003,8.7016\n").unwrap();

    pendulum(&cfg)
        .arg("calibrate")
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("[force]"))
        .stdout(predicate::str::contains("gain = "))
        .stdout(predicate::str::contains("offset = "));

    let out = pendulum(&cfg)
        .arg("--json")
        .arg("calibrate")
        .arg(&csv)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    let gain = v["gain"].as_f64().unwrap();
    let offset = v["offset"].as_f64().unwrap();
    assert!((gain - 33508.0).abs() < 1e-3, "gain {gain}");
    assert!((offset - 0.0001 + 2.0 / 33508.0).abs() < 1e-9, "offset {offset}");
}

#[test]
fn bad_calibration_header_is_reported() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    let csv = dir.path().join("cal.csv");
    fs::write(&csv, "raw,value\n100,0.0\n200,1.0\n").unwrap();

    pendulum(&cfg)
        .arg("--calibration")
        .arg(&csv)
        .arg("self-check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid headers"));
}
