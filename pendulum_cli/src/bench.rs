//! Bench commands: fire the release once, check the sensors, fit a
//! calibration CSV.

use std::path::Path;

use pendulum_config::{Calibration, Config};
use pendulum_core::mass::ChannelSet;
use pendulum_core::{CalibrationModel, CancelToken, MassCfg, TriggerCfg, TriggerSequencer};
use pendulum_traits::{Gyro, MonotonicClock};
use serde_json::json;

use crate::cli::json_mode;
use crate::rig::sim_rig;

fn confirm(yes: bool, msg: &str) -> eyre::Result<()> {
    if yes {
        return Ok(());
    }
    eprint!("{msg} [Enter] ");
    let mut line = String::new();
    if std::io::stdin().read_line(&mut line)? == 0 {
        eyre::bail!("no operator input (stdin closed); pass --yes to run unattended");
    }
    Ok(())
}

pub fn trigger(cfg: &Config, yes: bool) -> eyre::Result<()> {
    let seq = TriggerSequencer::new(TriggerCfg::from(&cfg.trigger), MonotonicClock::new());
    confirm(yes, "Stand clear of the plate: firing the release")?;

    #[cfg(all(feature = "hardware", target_os = "linux"))]
    let (mut stepper, mut magnets) = (
        pendulum_hardware::gpio::GpioStepper::new(cfg.pins.step, cfg.pins.dir)?,
        pendulum_hardware::gpio::GpioMagnets::new(&cfg.pins.magnets)?,
    );
    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    let (mut stepper, mut magnets) = {
        let rig = sim_rig(cfg, None);
        (rig.stepper(), rig.magnets())
    };

    tracing::info!(
        expected_s = seq.duration().as_secs_f64(),
        "firing release sequence"
    );
    let started = std::time::Instant::now();
    seq.fire(&mut stepper, &mut magnets, &CancelToken::new())?;
    let took = started.elapsed().as_secs_f64();
    if json_mode() {
        println!("{}", json!({ "released": true, "duration_s": took }));
    } else {
        println!("Release sequence complete in {took:.2} s");
    }
    Ok(())
}

pub fn self_check(cfg: &Config, calibration: Option<&Calibration>) -> eyre::Result<()> {
    let rig = sim_rig(cfg, calibration);
    let mass_cfg = MassCfg::from(&cfg.force);
    let attached = ChannelSet::open(&mut rig.bridge(), &mass_cfg)?.attached();
    let z = rig
        .gyro()
        .read_z()
        .map_err(|e| pendulum_core::hw_error::map_hw_error(e.as_ref()))?;
    let model = match calibration {
        Some(c) => CalibrationModel::try_from(c)?,
        None => CalibrationModel::try_from(&cfg.force)?,
    };
    tracing::info!(attached, configured = mass_cfg.channels, gyro_z_dps = z, "self-check");
    if json_mode() {
        println!(
            "{}",
            json!({
                "ok": true,
                "channels_attached": attached,
                "channels_configured": mass_cfg.channels,
                "gyro_z_dps": z,
                "gain": model.gain(),
                "offset": model.offset(),
            })
        );
    } else {
        println!(
            "OK: {attached}/{} bridge channels attached, gyro z = {z:.3} deg/s",
            mass_cfg.channels
        );
    }
    Ok(())
}

/// Fit `csv` and print a `[force]` snippet with the resulting gain/offset.
pub fn calibrate(csv: &Path) -> eyre::Result<()> {
    let cal = pendulum_config::load_calibration_csv(csv)?;
    if json_mode() {
        println!("{}", json!({ "gain": cal.gain, "offset": cal.offset }));
        return Ok(());
    }
    let mut force = toml::Table::new();
    force.insert("gain".into(), toml::Value::Float(cal.gain));
    force.insert("offset".into(), toml::Value::Float(cal.offset));
    let mut doc = toml::Table::new();
    doc.insert("force".into(), toml::Value::Table(force));
    print!("{}", toml::to_string(&doc)?);
    Ok(())
}
