//! `run` and `analyze`: a full experiment on the rig, or the analysis of a
//! saved signal.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::WrapErr;
use pendulum_config::{Calibration, Config};
use pendulum_core::{AnalysisCfg, AnalysisEngine, Components, MassEstimate, Session, Stage, Step};
use pendulum_traits::MonotonicClock;

use crate::cli::{RtArgs, json_mode};
use crate::report::Report;
use crate::rig::sim_rig;
use crate::rt::setup_rt_once;
use crate::signal_io;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub struct RunOpts {
    pub yes: bool,
    pub plot: Option<PathBuf>,
    pub save_signal: Option<PathBuf>,
    pub rt: RtArgs,
}

/// Operator prompts on stderr; `--yes` skips them.
struct Prompter {
    skip: bool,
}

impl Prompter {
    fn confirm(&self, msg: &str) -> eyre::Result<()> {
        if self.skip {
            tracing::info!("{msg}");
            return Ok(());
        }
        let mut err = std::io::stderr().lock();
        write!(err, "{msg} [Enter] ")?;
        err.flush()?;
        let mut line = String::new();
        if std::io::stdin().lock().read_line(&mut line)? == 0 {
            eyre::bail!("no operator input (stdin closed); pass --yes to run unattended");
        }
        Ok(())
    }
}

/// Run `step` on the session worker, turning a shutdown request into a
/// cancellation.
fn run_step(
    session: &mut Session<MonotonicClock>,
    step: Step,
    shutdown: &AtomicBool,
) -> eyre::Result<Stage> {
    session.start(step)?;
    tracing::info!(step = %step, "started");
    let mut cancelled = false;
    loop {
        if !cancelled && shutdown.load(Ordering::Relaxed) {
            tracing::warn!(step = %step, "shutdown requested; cancelling");
            session.cancel();
            cancelled = true;
        }
        if let Some(res) = session.poll() {
            return Ok(res?);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

pub fn run_experiment(
    cfg: &Config,
    calibration: Option<&Calibration>,
    opts: &RunOpts,
    shutdown: &Arc<AtomicBool>,
) -> eyre::Result<()> {
    let rig = sim_rig(cfg, calibration);
    let components = Components::from_config(cfg, calibration, MonotonicClock::new())?;
    let mut session = Session::new(components, Arc::new(rig.clone()));
    let prompt = Prompter { skip: opts.yes };

    prompt.confirm("Place the empty plate on the rig")?;
    run_step(&mut session, Step::MeasurePlate, shutdown)?;

    prompt.confirm("Place the object on the plate")?;
    rig.place_object();
    run_step(&mut session, Step::MeasureObject, shutdown)?;

    prompt.confirm(&format!(
        "Stand clear: the release fires {:.1} s into a {:.1} s recording",
        cfg.acquisition.trigger_at_s, cfg.acquisition.duration_s
    ))?;
    setup_rt_once(&opts.rt);
    run_step(&mut session, Step::Acquire, shutdown)?;

    session.analyze()?;
    let exp = session.experiment();
    let results = exp.results();
    let acquisition = exp.oscillation();

    if let (Some(path), Some(r)) = (opts.plot.as_deref(), results) {
        r.plot
            .save(path)
            .wrap_err_with(|| format!("write plot to {}", path.display()))?;
    }
    if let (Some(path), Some(a)) = (opts.save_signal.as_deref(), acquisition) {
        signal_io::save(path, &a.signal)?;
    }

    print_report(&Report {
        plate: exp.baseline(),
        object: exp.object(),
        acquisition: acquisition.map(|a| &a.stats),
        results,
        plot_path: opts.plot.as_deref(),
        signal_path: opts.save_signal.as_deref(),
    });
    Ok(())
}

/// Analyze a signal saved by `run --save-signal` with a known object mass.
pub fn analyze_saved(
    cfg: &Config,
    signal_path: &Path,
    object_kg: f64,
    plot: Option<&Path>,
) -> eyre::Result<()> {
    if !(object_kg.is_finite() && object_kg > 0.0) {
        eyre::bail!("--object-kg must be a positive mass, got {object_kg}");
    }
    let signal = signal_io::load(signal_path)?;
    tracing::info!(samples = signal.len(), span_s = signal.span(), "signal loaded");
    let results = AnalysisEngine::new(AnalysisCfg::from(cfg)).analyze(&signal, object_kg);
    if let Some(path) = plot {
        results
            .plot
            .save(path)
            .wrap_err_with(|| format!("write plot to {}", path.display()))?;
    }
    // Entered by hand, not measured.
    let object = MassEstimate {
        kg: object_kg,
        samples: 0,
        channels: 0,
        baseline_kg: None,
    };
    print_report(&Report {
        object: Some(&object),
        results: Some(&results),
        plot_path: plot,
        ..Report::default()
    });
    Ok(())
}

pub fn print_report(report: &Report<'_>) {
    if json_mode() {
        println!("{}", report.to_json());
    } else {
        println!("{}", report.render_human());
    }
}
