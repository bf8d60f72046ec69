use criterion::{Criterion, black_box, criterion_group, criterion_main};
use pendulum_core::{AnalysisCfg, AnalysisEngine, Signal};

// 30 s of a decaying oscillation at 100 Hz with small deterministic jitter
fn synth_trial(seed: u32) -> Signal {
    let mut state = seed.max(1);
    let mut jitter = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        (f64::from(x) / (f64::from(u32::MAX) + 1.0) * 2.0 - 1.0) * 0.02
    };
    let mut s = Signal::with_capacity(3000);
    for i in 0..3000 {
        let t = f64::from(i) * 0.01;
        let released = (t - 3.26).max(0.0);
        let v = 40.0 * (-released / 2.0).exp() * (std::f64::consts::TAU * released / 3.0).sin();
        // push only rejects bad timestamps; these are strictly increasing
        let _ = s.push(t, v + jitter());
    }
    s
}

pub fn bench_analyze(c: &mut Criterion) {
    let mut g = c.benchmark_group("analysis");
    //   BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p pendulum_core --bench analysis
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(n) = ss.parse::<usize>() {
            g.sample_size(n.max(1));
        }
    } else {
        g.sample_size(30);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(std::time::Duration::from_millis(ms_u64));
    }

    let trial = synth_trial(0xC0FFEE);
    for window in [5usize, 10, 25] {
        let engine = AnalysisEngine::new(AnalysisCfg {
            smoothing_window: window,
            ..AnalysisCfg::default()
        });
        g.bench_function(format!("analyze_window_{window}"), |b| {
            b.iter(|| black_box(engine.analyze(black_box(&trial), 1.0)));
        });
    }
    g.finish();
}

criterion_group!(analysis, bench_analyze);
criterion_main!(analysis);
