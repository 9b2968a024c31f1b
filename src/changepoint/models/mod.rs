//! models — user-facing change point model APIs.
//!
//! Purpose
//! -------
//! Expose the high-level change point surface built on `changepoint::core`:
//! the [`ChangePointModel`] with its forward/backward recursions, the
//! three readouts (`filter`, `smooth`, `online_smooth`), synthetic data
//! generation, and flat-vector persistence.
//!
//! Key behaviors
//! -------------
//! - Wire predict/update steps into full sweeps that return one bounded
//!   message per time step.
//! - Keep the change hypothesis in the protected slot 0 of every predict
//!   message so changepoint probabilities read off as prefix sums of
//!   posterior weights.
//! - Hold the change probability in an immutable [`ChangeProb`] value
//!   whose log forms can never drift from the probability itself.
//!
//! Invariants & assumptions
//! ------------------------
//! - Block sizes (m, n) and the prior are fixed per model instance; only
//!   the change probability is swappable after construction.
//! - All entry points validate their inputs; the inner recursion loops
//!   assume validated data and reserve panics for logic bugs.

pub mod bcpm;

pub use self::bcpm::{ChangePointModel, ChangeProb, MULTINOMIAL_TRIALS};
