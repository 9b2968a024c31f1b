//! core — potentials, bounded messages, and shared numerics.
//!
//! Purpose
//! -------
//! Collect the numerical building blocks of the change point stack: the
//! conjugate [`Potential`] algebra, the capacity-bounded [`Message`]
//! mixture, experiment/result containers, log-domain numerics, and
//! validation helpers. The model layer in `models` wires these into the
//! forward/backward recursions.
//!
//! Key behaviors
//! -------------
//! - Define the atomic conjugate factor ([`Potential`]) with closed-form
//!   products, observation lifting, sampling, and moment-based
//!   re-estimation.
//! - Bound mixture growth via [`Message`] and its min-heap eviction
//!   policy (greedy drop of the lowest-weight component, protected
//!   slot 0).
//! - Carry experiments and readouts in [`Data`] / [`Estimate`],
//!   including F-score evaluation against ground-truth changepoints.
//! - Centralize log-domain primitives ([`log_sum_exp`], [`softmax`]) and
//!   the digamma-inverse / Newton solvers behind [`numerics`].
//!
//! Invariants & assumptions
//! ------------------------
//! - Latent states split into an m-dimensional categorical block and an
//!   n-dimensional Poisson-rate block; every concatenated layout is
//!   categorical first.
//! - Gamma parameters use the shape/**scale** convention; conversion to
//!   `statrs` rates happens only at sampling sites.
//! - All mixture weights live in log domain; nothing in this layer
//!   exponentiates without a max shift.
//! - Shape mismatches between same-model potentials are logic bugs and
//!   panic; user-supplied data is validated at API boundaries via
//!   [`validation`].
//!
//! Conventions
//! -----------
//! - Indexing is 0-based throughout; sequences store the oldest step at
//!   index 0.
//! - This layer performs no I/O except the explicit save/load methods on
//!   the containers, which delegate to `changepoint::persistence`.

pub mod data;
pub mod message;
pub mod numerics;
pub mod potential;
pub mod validation;

pub use self::data::{Data, Estimate, DEFAULT_THRESHOLD, DEFAULT_WINDOW};
pub use self::message::{Message, DEFAULT_MAX_K};
pub use self::numerics::{log_sum_exp, softmax};
pub use self::potential::Potential;
