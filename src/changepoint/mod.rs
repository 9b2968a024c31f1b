//! changepoint — online Bayesian change point detection stack.
//!
//! Purpose
//! -------
//! Provide a cohesive change point layer for multivariate count streams:
//! conjugate potentials and bounded message passing in [`core`], the
//! user-facing [`ChangePointModel`] in [`models`], flat-text persistence
//! in [`persistence`], and shared error types in [`errors`]. This is the
//! surface most consumers (including the Python bindings) should depend
//! on.
//!
//! Key behaviors
//! -------------
//! - Model observation rows of width `m + n` — `m` categorical counts
//!   and `n` Poisson counts — whose latent state resets with probability
//!   `p1` at each step and persists otherwise.
//! - Run exact conjugate message passing with the mixture size capped at
//!   `max_k` components per message (greedy eviction of the
//!   lowest-weight hypothesis), so cost per step is O(max_k) rather than
//!   O(t).
//! - Offer three readouts over the same forward sweep: filtering
//!   (causal), fixed-interval smoothing (full future), and fixed-lag
//!   smoothing (bounded future), each producing an [`Estimate`].
//! - Generate synthetic experiments from the model's own generative
//!   story ([`Data`]) and score estimates against ground truth with a
//!   windowed F-score.
//! - Centralize error surfaces in [`errors`] ([`BCPMError`] for modeling,
//!   [`PersistError`] for the text persistence layer) with `PyErr`
//!   conversions behind the `python-bindings` feature.
//!
//! Invariants & assumptions
//! ------------------------
//! - Observations are validated at API boundaries: finite, nonnegative,
//!   width `m + n`, at least one row. The inner recursions assume
//!   validated inputs and reserve panics for logic bugs such as shape
//!   mismatches between same-model potentials.
//! - Mixture weights are carried in log domain end to end; summaries use
//!   max-shifted log-sum-exp / softmax, so `p1 = 0` (never change) is a
//!   legal limit rather than a special case.
//! - The component in slot 0 of every message is the change hypothesis
//!   and is never evicted; changepoint probabilities are prefix sums of
//!   posterior weights over change slots.
//! - Gamma scales follow the shape/scale convention (Poisson-block means
//!   are `a·b`); conversion to `statrs` rates is confined to sampling.
//!
//! Conventions
//! -----------
//! - Indexing is 0-based; sequences store the oldest step at index 0 and
//!   all per-step outputs align with the input rows.
//! - The stack performs no logging and no I/O outside the explicit
//!   save/load methods; callers orchestrate persistence. Error conditions
//!   surface as [`BCPMResult`] / `Result<_, PersistError>`.
//!
//! Downstream usage
//! ----------------
//! - Typical end-to-end flow:
//!   1. Construct a [`ChangePointModel`] via `new(p1, alpha, a, b)` or
//!      `default_model(p1, m, n)`, optionally tuning `with_max_k`.
//!   2. Run `filter`, `smooth`, or `online_smooth(lag)` over a
//!      T × (m + n) observation matrix to get an [`Estimate`].
//!   3. Optionally `Estimate::evaluate` against ground-truth indicators
//!      and persist everything with the `save` methods.
//! - The Python bindings import from this module and rely on the
//!   `BCPMError` / `PersistError` → `PyErr` conversions in [`errors`].
//!
//! Testing notes
//! -------------
//! - Unit tests live next to each module: potential algebra and
//!   re-estimation in `core::potential`, eviction/capacity behavior in
//!   `core::message`, solver accuracy in `core::numerics`, F-scoring in
//!   `core::data`, recursion wiring in `models::bcpm`, and the on-disk
//!   format in `persistence`.
//! - End-to-end behavior of the three readouts on realistic sequences is
//!   covered by the integration tests under `tests/`.

pub mod core;
pub mod errors;
pub mod models;
pub mod persistence;

// ---- Re-exports (primary public surface) ----------------------------------
//
// The everyday types most users need. Lower-level pieces (validation
// helpers, raw numerics, the persistence primitives) stay under their
// submodules.

pub use self::core::{Data, Estimate, Message, Potential, DEFAULT_MAX_K};
pub use self::errors::{BCPMError, BCPMResult, PersistError};
pub use self::models::{ChangePointModel, ChangeProb};

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use bcpm::changepoint::prelude::*;
//
// to import the main model surface in a single line.

pub mod prelude {
    pub use super::{
        BCPMError, BCPMResult, ChangePointModel, ChangeProb, Data, Estimate, Message,
        PersistError, Potential, DEFAULT_MAX_K,
    };
}
