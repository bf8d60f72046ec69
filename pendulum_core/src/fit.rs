//! Levenberg–Marquardt fit of `y = A·exp(-x/τ) + C`.
//!
//! Returns `None` instead of an error for every failure mode (too few
//! points, no decay to seed from, evaluation budget exhausted, non-finite
//! arithmetic); callers treat the fit as an optional quantity.

/// Converged parameters of an exponential decay. `x` is measured from the
/// first sample handed to [`fit_exp_decay`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpDecay {
    pub amplitude: f64,
    pub tau: f64,
    pub offset: f64,
    /// Model evaluations spent, including the initial guess.
    pub evals: usize,
}

impl ExpDecay {
    pub fn eval(&self, x: f64) -> f64 {
        self.amplitude * (-x / self.tau).exp() + self.offset
    }
}

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e12;
const REL_COST_TOL: f64 = 1e-12;
const REL_STEP_TOL: f64 = 1e-10;
const GRAD_TOL: f64 = 1e-12;

/// Fit `y ≈ A·exp(-(t - t[0])/τ) + C` with at most `max_evals` cost evaluations.
///
/// The initial guess takes `C` from the median of the last quarter, `τ` from
/// the first moment of the positive excess over `C`, and `A` from its area.
pub fn fit_exp_decay(t: &[f64], y: &[f64], max_evals: usize) -> Option<ExpDecay> {
    let n = t.len();
    if n < 4 || y.len() != n || max_evals == 0 {
        return None;
    }
    if t.iter().chain(y).any(|v| !v.is_finite()) {
        return None;
    }
    let t0 = t[0];
    let x: Vec<f64> = t.iter().map(|ti| ti - t0).collect();

    let mut p = initial_guess(&x, y)?;
    let mut cost = sum_sq(&x, y, &p)?;
    let mut evals = 1usize;
    let mut lambda = LAMBDA_INIT;

    while evals < max_evals {
        let (h, g) = normal_equations(&x, y, &p)?;
        let g_max = g.iter().fold(0.0f64, |m, v| m.max(v.abs()));
        if g_max < GRAD_TOL * (1.0 + cost) {
            return Some(done(p, evals));
        }

        // Inner loop: raise damping until a step lowers the cost.
        loop {
            let mut m = h;
            for i in 0..3 {
                m[i][i] += lambda * h[i][i].max(1e-12);
            }
            let step = solve_3x3(&m, &[-g[0], -g[1], -g[2]]);
            let candidate = step.map(|d| [p[0] + d[0], p[1] + d[1], p[2] + d[2]]);
            let (d, q) = match (step, candidate) {
                (Some(d), Some(q)) if q[1] > 0.0 => (d, q),
                _ => {
                    lambda *= 10.0;
                    if lambda > LAMBDA_MAX {
                        return None;
                    }
                    continue;
                }
            };

            evals += 1;
            let next = sum_sq(&x, y, &q);
            match next {
                Some(c) if c < cost => {
                    let rel_cost = (cost - c) / cost.max(f64::MIN_POSITIVE);
                    let rel_step = (0..3)
                        .map(|i| d[i].abs() / (p[i].abs() + 1e-12))
                        .fold(0.0f64, f64::max);
                    p = q;
                    cost = c;
                    lambda = (lambda / 10.0).max(LAMBDA_MIN);
                    if rel_cost < REL_COST_TOL || rel_step < REL_STEP_TOL {
                        return Some(done(p, evals));
                    }
                    break;
                }
                _ => {
                    lambda *= 10.0;
                    if lambda > LAMBDA_MAX {
                        // No descent direction left: the current point is a minimum.
                        return Some(done(p, evals));
                    }
                    if evals >= max_evals {
                        return None;
                    }
                }
            }
        }
    }
    None
}

fn done(p: [f64; 3], evals: usize) -> ExpDecay {
    ExpDecay {
        amplitude: p[0],
        tau: p[1],
        offset: p[2],
        evals,
    }
}

fn initial_guess(x: &[f64], y: &[f64]) -> Option<[f64; 3]> {
    let n = x.len();
    let mut tail: Vec<f64> = y[n - (n / 4).max(1)..].to_vec();
    tail.sort_by(f64::total_cmp);
    let c = tail[tail.len() / 2];

    let mut area = 0.0;
    let mut moment = 0.0;
    for i in 1..n {
        let dt = x[i] - x[i - 1];
        let (a, b) = ((y[i - 1] - c).max(0.0), (y[i] - c).max(0.0));
        area += 0.5 * (a + b) * dt;
        moment += 0.5 * (a * x[i - 1] + b * x[i]) * dt;
    }
    if area.is_nan() || area <= 0.0 {
        return None;
    }
    let span = x[n - 1];
    let tau = (moment / area).clamp(span / n as f64, span);
    if !(tau > 0.0 && tau.is_finite()) {
        return None;
    }
    Some([area / tau, tau, c])
}

fn sum_sq(x: &[f64], y: &[f64], p: &[f64; 3]) -> Option<f64> {
    let s: f64 = x
        .iter()
        .zip(y)
        .map(|(xi, yi)| {
            let r = p[0] * (-xi / p[1]).exp() + p[2] - yi;
            r * r
        })
        .sum();
    s.is_finite().then_some(s)
}

/// `JᵀJ` and `Jᵀr` at `p`.
fn normal_equations(x: &[f64], y: &[f64], p: &[f64; 3]) -> Option<([[f64; 3]; 3], [f64; 3])> {
    let [a, tau, c] = *p;
    let mut h = [[0.0f64; 3]; 3];
    let mut g = [0.0f64; 3];
    for (xi, yi) in x.iter().zip(y) {
        let e = (-xi / tau).exp();
        let r = a * e + c - yi;
        let j = [e, a * e * xi / (tau * tau), 1.0];
        for row in 0..3 {
            g[row] += j[row] * r;
            for col in 0..3 {
                h[row][col] += j[row] * j[col];
            }
        }
    }
    let finite = g.iter().chain(h.iter().flatten()).all(|v| v.is_finite());
    finite.then_some((h, g))
}

/// Solve `a·x = b` by cofactor expansion; `None` when singular.
fn solve_3x3(a: &[[f64; 3]; 3], b: &[f64; 3]) -> Option<[f64; 3]> {
    let det = a[0][0] * (a[1][1] * a[2][2] - a[1][2] * a[2][1])
        - a[0][1] * (a[1][0] * a[2][2] - a[1][2] * a[2][0])
        + a[0][2] * (a[1][0] * a[2][1] - a[1][1] * a[2][0]);
    if !det.is_finite() || det.abs() < f64::MIN_POSITIVE {
        return None;
    }
    let inv_det = 1.0 / det;
    let inv = [
        [
            (a[1][1] * a[2][2] - a[1][2] * a[2][1]) * inv_det,
            (a[0][2] * a[2][1] - a[0][1] * a[2][2]) * inv_det,
            (a[0][1] * a[1][2] - a[0][2] * a[1][1]) * inv_det,
        ],
        [
            (a[1][2] * a[2][0] - a[1][0] * a[2][2]) * inv_det,
            (a[0][0] * a[2][2] - a[0][2] * a[2][0]) * inv_det,
            (a[0][2] * a[1][0] - a[0][0] * a[1][2]) * inv_det,
        ],
        [
            (a[1][0] * a[2][1] - a[1][1] * a[2][0]) * inv_det,
            (a[0][1] * a[2][0] - a[0][0] * a[2][1]) * inv_det,
            (a[0][0] * a[1][1] - a[0][1] * a[1][0]) * inv_det,
        ],
    ];
    let x = [
        inv[0][0] * b[0] + inv[0][1] * b[1] + inv[0][2] * b[2],
        inv[1][0] * b[0] + inv[1][1] * b[1] + inv[1][2] * b[2],
        inv[2][0] * b[0] + inv[2][1] * b[1] + inv[2][2] * b[2],
    ];
    x.iter().all(|v| v.is_finite()).then_some(x)
}
