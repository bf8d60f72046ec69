#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! `pendulum`: run moment-of-inertia experiments on the torsion-pendulum rig.

mod bench;
mod cli;
mod error_fmt;
mod report;
mod rig;
mod rt;
mod run;
mod signal_io;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use pendulum_config::{Calibration, Config};
use pendulum_core::RigError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

/// Read and validate the config; any problem is a `RigError::Config`.
fn load_config(path: Option<&Path>) -> eyre::Result<Config> {
    let cfg = match path {
        Some(p) => {
            let text = std::fs::read_to_string(p)
                .wrap_err_with(|| format!("read config {}", p.display()))?;
            pendulum_config::load_toml(&text)
                .map_err(|e| RigError::Config(format!("parse {}: {e}", p.display())))?
        }
        None => Config::default(),
    };
    cfg.validate().map_err(|e| RigError::Config(format!("{e:#}")))?;
    Ok(cfg)
}

/// Console (pretty or JSON, stderr) plus optional JSON-lines file from `[logging]`.
fn init_tracing(cli: &Cli, cfg: &Config) -> eyre::Result<()> {
    let level = cli
        .log_level
        .as_deref()
        .or(cfg.logging.level.as_deref())
        .unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    let console = if cli.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed()
    };

    let file = match cfg.logging.file.as_deref() {
        Some(path) => {
            let path = Path::new(path);
            let dir = path.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file must name a file"))?;
            let appender = match cfg.logging.rotation.as_deref().unwrap_or("never") {
                "daily" => tracing_appender::rolling::daily(dir, name),
                "hourly" => tracing_appender::rolling::hourly(dir, name),
                "never" => tracing_appender::rolling::never(dir, name),
                other => eyre::bail!("logging.rotation must be never, daily or hourly, got '{other}'"),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()?;
    Ok(())
}

fn load_calibration(cli: &Cli) -> eyre::Result<Option<Calibration>> {
    cli.calibration
        .as_deref()
        .map(pendulum_config::load_calibration_csv)
        .transpose()
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    let cfg = load_config(cli.config.as_deref())?;
    init_tracing(&cli, &cfg)?;
    let calibration = load_calibration(&cli)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
            tracing::warn!(error = %e, "Ctrl-C handler not installed");
        }
    }

    match &cli.cmd {
        Commands::Run {
            yes,
            plot,
            save_signal,
            rt,
        } => run::run_experiment(
            &cfg,
            calibration.as_ref(),
            &run::RunOpts {
                yes: *yes,
                plot: plot.clone(),
                save_signal: save_signal.clone(),
                rt: *rt,
            },
            &shutdown,
        ),
        Commands::Analyze {
            signal,
            object_kg,
            plot,
        } => run::analyze_saved(&cfg, signal, *object_kg, plot.as_deref()),
        Commands::Trigger { yes } => bench::trigger(&cfg, *yes),
        Commands::SelfCheck => bench::self_check(&cfg, calibration.as_ref()),
        Commands::Calibrate { csv } => bench::calibrate(csv),
    }
}

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if !cli.json {
        // Only affects panics and reports printed by color-eyre itself.
        let _ = color_eyre::install();
    }

    if let Err(err) = real_main(cli) {
        tracing::error!(error = %format!("{err:#}"), "command failed");
        if cli::json_mode() {
            println!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}
