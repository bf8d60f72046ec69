//! Acquired signals on disk: `time_s,rate_dps` CSV.

use std::path::Path;

use eyre::WrapErr;
use pendulum_core::Signal;

const HEADERS: [&str; 2] = ["time_s", "rate_dps"];

/// Write `signal` to `path`, replacing any existing file atomically.
pub fn save(path: &Path, signal: &Signal) -> eyre::Result<()> {
    let mut w = csv::Writer::from_writer(Vec::with_capacity(signal.len() * 24));
    w.write_record(HEADERS)?;
    for (t, v) in signal.iter() {
        w.write_record([format!("{t:.6}"), format!("{v:.6}")])?;
    }
    let bytes = w.into_inner().map_err(|e| eyre::eyre!("flush signal CSV: {e}"))?;
    pendulum_core::atomic::write_atomic(path, &bytes)
        .wrap_err_with(|| format!("write signal to {}", path.display()))
}

/// Read a signal saved by [`save`]. Timestamps must be strictly increasing.
pub fn load(path: &Path) -> eyre::Result<Signal> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .wrap_err_with(|| format!("open signal {}", path.display()))?;
    let headers = rdr.headers()?.clone();
    if headers.iter().ne(HEADERS) {
        eyre::bail!("signal CSV must have headers 'time_s,rate_dps'");
    }
    let mut signal = Signal::new();
    for (i, rec) in rdr.records().enumerate() {
        let line = i + 2;
        let rec = rec.wrap_err_with(|| format!("invalid signal CSV row {line}"))?;
        let parse = |k: usize| -> eyre::Result<f64> {
            rec.get(k)
                .ok_or_else(|| eyre::eyre!("signal CSV row {line} has too few columns"))?
                .parse::<f64>()
                .wrap_err_with(|| format!("invalid signal CSV row {line}"))
        };
        signal
            .push(parse(0)?, parse(1)?)
            .wrap_err_with(|| format!("invalid signal CSV row {line}"))?;
    }
    Ok(signal)
}
