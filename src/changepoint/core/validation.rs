//! Validation helpers for change point model inputs.
//!
//! One function per invariant, each returning `BCPMResult<()>` with a
//! struct-carrying error variant so callers can surface exact indices and
//! offending values. These run at API boundaries (model construction,
//! `filter`/`smooth`/`online_smooth` entry, re-estimation); the inner
//! recursions assume validated inputs and reserve panics for logic bugs.
use ndarray::{ArrayView1, ArrayView2};

use crate::changepoint::errors::{BCPMError, BCPMResult};

/// Check that a change probability is finite with `0 ≤ p1 < 1`.
///
/// Zero is allowed (a model that never changes is a meaningful limit and
/// exercises the `-inf` log-weight path); one is rejected because
/// `log(1 − p1)` is undefined there.
pub fn validate_change_prob(p1: f64) -> BCPMResult<()> {
    if !p1.is_finite() || !(0.0..1.0).contains(&p1) {
        return Err(BCPMError::InvalidChangeProb { value: p1 });
    }
    Ok(())
}

/// Check prior block parameters: at least one block present, Dirichlet
/// concentrations finite and > 0, Gamma shape/scale vectors of equal
/// length with finite, strictly positive entries.
pub fn validate_prior(
    alpha: ArrayView1<f64>, a: ArrayView1<f64>, b: ArrayView1<f64>,
) -> BCPMResult<()> {
    if alpha.is_empty() && a.is_empty() {
        return Err(BCPMError::EmptyPrior);
    }
    if a.len() != b.len() {
        return Err(BCPMError::GammaLengthMismatch { a_len: a.len(), b_len: b.len() });
    }
    for (index, &value) in alpha.iter().enumerate() {
        if !value.is_finite() || value <= 0.0 {
            return Err(BCPMError::InvalidDirichletParam { index, value });
        }
    }
    for (index, &value) in a.iter().enumerate() {
        if !value.is_finite() || value <= 0.0 {
            return Err(BCPMError::InvalidGammaShape { index, value });
        }
    }
    for (index, &value) in b.iter().enumerate() {
        if !value.is_finite() || value <= 0.0 {
            return Err(BCPMError::InvalidGammaScale { index, value });
        }
    }
    Ok(())
}

/// Check a message capacity: `max_k ≥ 1`.
pub fn validate_capacity(max_k: usize) -> BCPMResult<()> {
    if max_k == 0 {
        return Err(BCPMError::ZeroCapacity);
    }
    Ok(())
}

/// Check a full observation matrix against the model width `m + n`:
/// nonempty, correct column count, all entries finite and nonnegative.
pub fn validate_obs_matrix(obs: ArrayView2<f64>, width: usize) -> BCPMResult<()> {
    if obs.nrows() == 0 {
        return Err(BCPMError::EmptySeries);
    }
    if obs.ncols() != width {
        return Err(BCPMError::ObsWidthMismatch { expected: width, actual: obs.ncols() });
    }
    for ((row, col), &value) in obs.indexed_iter() {
        if !value.is_finite() {
            return Err(BCPMError::NonFiniteObservation { row, col, value });
        }
        if value < 0.0 {
            return Err(BCPMError::NegativeObservation { row, col, value });
        }
    }
    Ok(())
}

/// Check a single observation row against the model width `m + n`.
pub fn validate_obs_row(obs: ArrayView1<f64>, width: usize) -> BCPMResult<()> {
    if obs.len() != width {
        return Err(BCPMError::ObsWidthMismatch { expected: width, actual: obs.len() });
    }
    for (col, &value) in obs.iter().enumerate() {
        if !value.is_finite() {
            return Err(BCPMError::NonFiniteObservation { row: 0, col, value });
        }
        if value < 0.0 {
            return Err(BCPMError::NegativeObservation { row: 0, col, value });
        }
    }
    Ok(())
}

/// Check a sufficient-statistics vector length against `m + 2n`
/// (one expected log-probability per category, then Gamma mean and
/// mean-log per Poisson feature).
pub fn validate_ss_len(ss_len: usize, m: usize, n: usize) -> BCPMResult<()> {
    let expected = m + 2 * n;
    if ss_len != expected {
        return Err(BCPMError::SsLengthMismatch { expected, actual: ss_len });
    }
    Ok(())
}

/// Check a latent state row used for observation sampling: width `m + n`,
/// categorical block nonnegative and finite (multinomial weights), Poisson
/// block finite and strictly positive (rates).
pub fn validate_latent_state(state: ArrayView1<f64>, m: usize, n: usize) -> BCPMResult<()> {
    if state.len() != m + n {
        return Err(BCPMError::ObsWidthMismatch { expected: m + n, actual: state.len() });
    }
    for (index, &value) in state.iter().enumerate() {
        let ok = if index < m { value.is_finite() && value >= 0.0 } else { value.is_finite() && value > 0.0 };
        if !ok {
            return Err(BCPMError::InvalidLatentState { index, value });
        }
    }
    Ok(())
}
