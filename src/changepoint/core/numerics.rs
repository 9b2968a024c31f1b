//! Log-domain arithmetic and conjugate-family re-estimation numerics.
//!
//! Provides the numerically guarded primitives that the message-passing
//! recursions lean on: max-shifted [`log_sum_exp`] and [`softmax`] over
//! component log-weights, plus the special functions needed to re-estimate
//! Dirichlet/Gamma parameters from expected sufficient statistics
//! ([`trigamma`], [`inv_digamma`], [`fit_dirichlet_from_ss`],
//! [`fit_gamma_from_ss`]).
//!
//! # Rationale
//! Mixture weights in these models span hundreds of orders of magnitude
//! (e.g. with a change probability of 1e-4 over long sequences), so sums
//! over component weights must always be evaluated after subtracting the
//! running maximum. `statrs` supplies `ln_gamma` and `digamma`; the
//! trigamma function and the digamma inverse have no `statrs` counterpart
//! and are implemented here with the standard recurrence + asymptotic
//! series and a guarded Newton iteration.
use ndarray::{Array1, ArrayView1};
use statrs::function::gamma::digamma;

use crate::changepoint::errors::{BCPMError, BCPMResult};

/// Absolute tolerance for the Newton solves in [`inv_digamma`] and
/// [`fit_gamma_from_ss`].
pub const NEWTON_TOL: f64 = 1e-12;

/// Iteration cap for the scalar Newton solves.
pub const MAX_NEWTON_ITER: usize = 50;

/// Iteration cap for the Dirichlet fixed-point re-estimation.
pub const MAX_FIXED_POINT_ITER: usize = 200;

/// Euler–Mascheroni constant, used by the digamma-inverse initializer.
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Normalize a nonnegative vector to sum to one.
///
/// Assumes `x` has a strictly positive sum; the caller guarantees this
/// (Dirichlet concentrations are validated > 0 at construction).
pub fn normalize(x: ArrayView1<f64>) -> Array1<f64> {
    let sum = x.sum();
    x.mapv(|v| v / sum)
}

/// Max-shifted `log(sum(exp(x)))`.
///
/// Subtracts the maximum before exponentiating so that the sum stays in a
/// well-conditioned regime. `-inf` entries contribute zero mass; if *every*
/// entry is `-inf` (or the input is empty of finite mass) the maximum is
/// returned unchanged, preserving the conventional `log(0) = -inf`.
pub fn log_sum_exp(x: ArrayView1<f64>) -> f64 {
    let max = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + x.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// Max-shifted softmax: `exp(x - max(x))` normalized to sum to one.
///
/// Requires at least one finite entry; `-inf` entries receive exactly zero
/// probability mass. Adding any constant to all of `x` leaves the result
/// unchanged.
pub fn softmax(x: ArrayView1<f64>) -> Array1<f64> {
    let max = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps = x.mapv(|v| (v - max).exp());
    let sum = exps.sum();
    exps.mapv(|v| v / sum)
}

/// Trigamma function `ψ₁(x) = d²/dx² ln Γ(x)` for `x > 0`.
///
/// Uses the recurrence `ψ₁(x) = ψ₁(x + 1) + 1/x²` to shift the argument
/// above 10, then the asymptotic Bernoulli series
/// `1/x + 1/(2x²) + 1/(6x³) − 1/(30x⁵) + 1/(42x⁷) − 1/(30x⁹)`.
///
/// Accuracy is ~1e-12 relative over the positive axis, which is ample for
/// the Newton steps it backs.
pub fn trigamma(x: f64) -> f64 {
    if x <= 0.0 || !x.is_finite() {
        return f64::NAN;
    }
    let mut x = x;
    let mut acc = 0.0;
    while x < 10.0 {
        acc += 1.0 / (x * x);
        x += 1.0;
    }
    let inv = 1.0 / x;
    let inv2 = inv * inv;
    let series = 1.0
        + inv * (0.5
            + inv * (1.0 / 6.0 + inv2 * (-1.0 / 30.0 + inv2 * (1.0 / 42.0 - inv2 / 30.0))));
    acc + inv * series
}

/// Inverse of the digamma function: solves `ψ(x) = y` for `x > 0`.
///
/// Starts from the classic piecewise initializer
/// `x₀ = exp(y) + 1/2` for `y > -2.22`, else `x₀ = -1/(y + γ)`,
/// then applies damped Newton steps `x ← x − (ψ(x) − y)/ψ₁(x)`, halving
/// back toward the previous iterate whenever a step leaves the positive
/// domain.
///
/// # Errors
/// Returns [`BCPMError::NonConvergence`] if `|ψ(x) − y|` has not dropped
/// below [`NEWTON_TOL`] within [`MAX_NEWTON_ITER`] iterations, or if the
/// iterate degenerates to a non-finite value.
pub fn inv_digamma(y: f64) -> BCPMResult<f64> {
    let mut x = if y > -2.22 { y.exp() + 0.5 } else { -1.0 / (y + EULER_GAMMA) };
    for _ in 0..MAX_NEWTON_ITER {
        let residual = digamma(x) - y;
        if residual.abs() < NEWTON_TOL {
            return Ok(x);
        }
        let step = residual / trigamma(x);
        let mut next = x - step;
        // Halve back into the domain instead of letting Newton overshoot
        // through zero.
        while next <= 0.0 {
            next = (x + next.max(0.0)) / 2.0;
            if next == x {
                break;
            }
        }
        if !next.is_finite() {
            return Err(BCPMError::NonConvergence {
                routine: "inv_digamma",
                iterations: MAX_NEWTON_ITER,
            });
        }
        x = next;
    }
    if (digamma(x) - y).abs() < NEWTON_TOL * 10.0 {
        return Ok(x);
    }
    Err(BCPMError::NonConvergence { routine: "inv_digamma", iterations: MAX_NEWTON_ITER })
}

/// Re-estimate Dirichlet concentrations from expected sufficient statistics.
///
/// Given `ss_i = E[ln π_i] = ψ(α_i) − ψ(∑α)`, runs the fixed-point
/// iteration `α_i ← ψ⁻¹(ss_i + ψ(∑α))` from a flat start `α = 1⃗` until the
/// largest coordinate change drops below [`NEWTON_TOL`].
///
/// # Errors
/// Returns [`BCPMError::NonConvergence`] if the fixed point is not reached
/// within [`MAX_FIXED_POINT_ITER`] sweeps, and propagates failures of the
/// inner [`inv_digamma`] solve.
pub fn fit_dirichlet_from_ss(ss: ArrayView1<f64>) -> BCPMResult<Array1<f64>> {
    let mut alpha = Array1::<f64>::ones(ss.len());
    for _ in 0..MAX_FIXED_POINT_ITER {
        let psi_sum = digamma(alpha.sum());
        let mut delta = 0.0_f64;
        for (i, &s) in ss.iter().enumerate() {
            let next = inv_digamma(s + psi_sum)?;
            delta = delta.max((next - alpha[i]).abs());
            alpha[i] = next;
        }
        if delta < NEWTON_TOL {
            return Ok(alpha);
        }
    }
    Err(BCPMError::NonConvergence {
        routine: "fit_dirichlet_from_ss",
        iterations: MAX_FIXED_POINT_ITER,
    })
}

/// Re-estimate Gamma (shape, scale) from expected sufficient statistics.
///
/// Given `mean = E[λ] = a·b` and `meanlog = E[ln λ] = ψ(a) + ln b`, the
/// shape solves `ln a − ψ(a) = ln(mean) − meanlog` — there is no closed
/// form, so Newton iterates `a ← a − (ln a − ψ(a) − c)/(1/a − ψ₁(a))`
/// from the standard initializer
/// `a₀ = (3 − c + √((c−3)² + 24c)) / (12c)`. The scale is then
/// `b = mean / a`.
///
/// # Errors
/// Returns [`BCPMError::NonConvergence`] when `c = ln(mean) − meanlog` is
/// not strictly positive (the statistics violate Jensen's inequality and
/// no Gamma matches them) or when the Newton solve fails to reach
/// [`NEWTON_TOL`] within [`MAX_NEWTON_ITER`] iterations.
pub fn fit_gamma_from_ss(mean: f64, meanlog: f64) -> BCPMResult<(f64, f64)> {
    let c = mean.ln() - meanlog;
    if !c.is_finite() || c <= 0.0 || mean <= 0.0 {
        return Err(BCPMError::NonConvergence { routine: "fit_gamma_from_ss", iterations: 0 });
    }
    let mut a = (3.0 - c + ((c - 3.0) * (c - 3.0) + 24.0 * c).sqrt()) / (12.0 * c);
    for _ in 0..MAX_NEWTON_ITER {
        let residual = a.ln() - digamma(a) - c;
        if residual.abs() < NEWTON_TOL {
            return Ok((a, mean / a));
        }
        let deriv = 1.0 / a - trigamma(a);
        let mut next = a - residual / deriv;
        while next <= 0.0 {
            next = (a + next.max(0.0)) / 2.0;
            if next == a {
                break;
            }
        }
        if !next.is_finite() {
            break;
        }
        a = next;
    }
    Err(BCPMError::NonConvergence { routine: "fit_gamma_from_ss", iterations: MAX_NEWTON_ITER })
}
