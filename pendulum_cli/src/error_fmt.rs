//! Human-readable error descriptions and structured JSON error formatting.

use pendulum_core::error::{BuildError, RigError};
use serde_json::json;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::InvalidGain | BuildError::InvalidOffset => format!(
                "What happened: The force calibration is unusable ({be}).\nLikely causes: [force] gain/offset edited by hand, or a calibration CSV with too little spread.\nHow to fix: Re-run `pendulum calibrate <csv>` and paste the printed values into the config."
            ),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(re) = err.downcast_ref::<RigError>() {
        return match re {
            RigError::HardwareUnavailable(msg) => format!(
                "What happened: No usable force-bridge channel ({msg}).\nLikely causes: Bridge unplugged, wrong serial number, or every cell listed in [simulation] failed_channels.\nHow to fix: Check the USB connection and force.serial_number, then run `pendulum self-check`."
            ),
            RigError::Timeout => "What happened: A sensor did not answer in time.\nLikely causes: Bridge or gyro disconnected, or force.attach_timeout_ms too low.\nHow to fix: Check cabling and power; raise force.attach_timeout_ms if the bridge is slow to attach.".to_string(),
            RigError::InsufficientData(msg) => format!(
                "What happened: Not enough data to compute a result ({msg}).\nLikely causes: Bridge channels attached but never reported, or a saved signal that is empty or out of order.\nHow to fix: Run `pendulum self-check`; for saved signals, check the CSV."
            ),
            RigError::Hardware(msg) => format!(
                "What happened: Hardware error ({msg}).\nLikely causes: Wiring fault, missing GPIO permissions, or a device that disappeared mid-run.\nHow to fix: Check [pins] and the wiring, then start a new run."
            ),
            RigError::Cancelled => "What happened: The run was cancelled.\nLikely causes: Ctrl-C during a measurement.\nHow to fix: Start a new run; earlier stages are not kept.".to_string(),
            RigError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: A value out of range or of the wrong type in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
            RigError::Sequence(e) => format!(
                "What happened: Step refused ({e}).\nLikely causes: Steps requested out of order.\nHow to fix: Start again from the plate measurement."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from config or CSV loading
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("calibration csv must have headers") {
        return "Invalid headers in calibration CSV. Expected 'ratio,kg'.".to_string();
    }
    if lower.contains("signal csv must have headers") {
        return "Invalid headers in signal CSV. Expected 'time_s,rate_dps'.".to_string();
    }
    if lower.starts_with("calibration") {
        return format!(
            "What happened: Calibration fit rejected ({msg}).\nLikely causes: Fewer than two reference loads, repeated or non-monotonic ratios.\nHow to fix: Record at least two distinct loads in increasing order."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable process exit codes per failure class.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 2;
    }
    match err.downcast_ref::<RigError>() {
        Some(RigError::Config(_)) => 2,
        Some(RigError::Hardware(_)) => 3,
        Some(RigError::HardwareUnavailable(_)) => 4,
        Some(RigError::Timeout) => 5,
        Some(RigError::InsufficientData(_)) => 6,
        Some(RigError::Cancelled) => 130,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "Config";
    }
    match err.downcast_ref::<RigError>() {
        Some(RigError::Hardware(_)) => "Hardware",
        Some(RigError::HardwareUnavailable(_)) => "HardwareUnavailable",
        Some(RigError::InsufficientData(_)) => "InsufficientData",
        Some(RigError::Sequence(_)) => "Sequence",
        Some(RigError::Busy) => "Busy",
        Some(RigError::Config(_)) => "Config",
        Some(RigError::Timeout) => "Timeout",
        Some(RigError::Cancelled) => "Cancelled",
        Some(RigError::Worker(_)) => "Worker",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
        "detail": format!("{err:#}"),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(RigError::Hardware("gpio".into()), 3, "Hardware error")]
    #[case(RigError::HardwareUnavailable("none".into()), 4, "No usable force-bridge channel")]
    #[case(RigError::Timeout, 5, "did not answer in time")]
    #[case(RigError::InsufficientData("empty".into()), 6, "Not enough data")]
    #[case(RigError::Cancelled, 130, "cancelled")]
    #[case(RigError::Busy, 1, "already in progress")]
    fn rig_errors_map_to_codes_and_text(
        #[case] e: RigError,
        #[case] code: i32,
        #[case] needle: &str,
    ) {
        let report = eyre::Report::new(e);
        assert_eq!(exit_code_for_error(&report), code);
        assert!(humanize(&report).contains(needle), "{}", humanize(&report));
    }

    #[test]
    fn json_error_has_reason_and_message() {
        let report = eyre::Report::new(RigError::Timeout);
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&report)).unwrap();
        assert_eq!(v["reason"], "Timeout");
        assert_eq!(v["exit_code"], 5);
        assert!(v["message"].as_str().unwrap().starts_with("What happened"));
    }

    #[test]
    fn wrapped_rig_error_is_still_recognized() {
        use eyre::WrapErr;
        let r: eyre::Result<()> = Err(RigError::Cancelled).wrap_err("acquire");
        let report = r.unwrap_err();
        assert_eq!(exit_code_for_error(&report), 130);
    }
}
