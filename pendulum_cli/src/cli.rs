//! CLI argument definitions and shared statics.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[inline]
pub fn json_mode() -> bool {
    JSON_MODE.get().copied().unwrap_or(false)
}

#[derive(Parser, Debug)]
#[command(
    name = "pendulum",
    version,
    about = "Torsion-pendulum moment-of-inertia rig"
)]
pub struct Cli {
    /// Path to config TOML; built-in defaults when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Optional calibration CSV (strict 'ratio,kg' header); overrides [force] gain/offset
    #[arg(long, value_name = "FILE")]
    pub calibration: Option<PathBuf>,

    /// Print reports and errors as JSON; logs go to stderr as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); RUST_LOG takes precedence
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Memory locking mode for real-time operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RtLock {
    /// Do not lock memory
    None,
    /// Lock currently resident pages
    Current,
    /// Lock current and future pages
    All,
}

impl RtLock {
    #[inline]
    pub fn os_default() -> Self {
        if cfg!(target_os = "linux") {
            RtLock::Current
        } else {
            RtLock::None
        }
    }
}

/// Real-time knobs shared by the commands that acquire data.
#[derive(Args, Debug, Clone, Copy)]
pub struct RtArgs {
    /// Enable real-time mode (SCHED_FIFO, affinity, mlockall)
    #[arg(
        long,
        action = ArgAction::SetTrue,
        long_help = "Enable real-time mode on supported OSes.\n\nLinux: attempts SCHED_FIFO priority, pins to one CPU and locks memory with mlockall. This reduces sampling jitter during the acquisition window but may need CAP_SYS_NICE / CAP_IPC_LOCK or a raised memlock ulimit.\n\nmacOS: only mlockall is applied."
    )]
    pub rt: bool,
    /// SCHED_FIFO priority (Linux); defaults to the system maximum
    #[arg(long, value_name = "PRIO")]
    pub rt_prio: Option<i32>,
    /// Memory locking mode for --rt: none, current or all
    #[arg(long, value_enum, value_name = "MODE")]
    pub rt_lock: Option<RtLock>,
    /// CPU index to pin to (Linux); defaults to 0
    #[arg(long, value_name = "CPU")]
    pub rt_cpu: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a full experiment: plate, object, oscillation, analysis
    Run {
        /// Do not wait for Enter between stages
        #[arg(long, short = 'y', action = ArgAction::SetTrue)]
        yes: bool,
        /// Write the diagnostic plot (SVG) here
        #[arg(long, value_name = "FILE")]
        plot: Option<PathBuf>,
        /// Save the acquired signal as CSV (time_s,rate_dps)
        #[arg(long, value_name = "FILE")]
        save_signal: Option<PathBuf>,
        #[command(flatten)]
        rt: RtArgs,
    },
    /// Re-analyze a saved signal CSV
    Analyze {
        /// Signal CSV written by `run --save-signal`
        #[arg(value_name = "SIGNAL")]
        signal: PathBuf,
        /// Mass of the object on the plate (kg)
        #[arg(long, value_name = "KG")]
        object_kg: f64,
        /// Write the diagnostic plot (SVG) here
        #[arg(long, value_name = "FILE")]
        plot: Option<PathBuf>,
    },
    /// Fire the release sequence once
    Trigger {
        /// Skip the confirmation prompt
        #[arg(long, short = 'y', action = ArgAction::SetTrue)]
        yes: bool,
    },
    /// Quick health check: attach every bridge channel and read the gyro once
    SelfCheck,
    /// Fit a calibration CSV and print the [force] gain/offset to paste into the config
    Calibrate {
        /// Calibration CSV with 'ratio,kg' header
        #[arg(value_name = "CSV")]
        csv: PathBuf,
    },
}
