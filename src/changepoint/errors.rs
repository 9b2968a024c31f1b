//! Errors for Bayesian change point models (prior/config validation,
//! observation checks, numerical re-estimation, sampling, and persistence).
//!
//! This module defines the model error type, [`BCPMError`], used across the
//! numerical core and the Python-facing API, and a persistence error type,
//! [`PersistError`], for the flat-text serialization layer. Both implement
//! `Display`/`Error`; [`BCPMError`] converts to `PyErr` for PyO3.
//!
//! ## Conventions
//! - **Indices are 0-based** (match Rust/NumPy).
//! - Observation entries must be **finite and nonnegative** (they are counts).
//! - Dirichlet concentrations and Gamma shapes/scales must be **finite and
//!   strictly positive**.
//! - Shape mismatches between potentials of the *same* model are logic bugs
//!   and panic; mismatches on user-supplied data surface as errors here.
//! - Iterative solvers (digamma inverse, Gamma shape fit) report
//!   [`BCPMError::NonConvergence`] rather than returning NaN silently.
#[cfg(feature = "python-bindings")]
use pyo3::exceptions::PyValueError;
#[cfg(feature = "python-bindings")]
use pyo3::prelude::*;
use statrs::distribution::{GammaError, PoissonError};

/// Crate-wide result alias for change point operations that may produce
/// [`BCPMError`].
pub type BCPMResult<T> = Result<T, BCPMError>;

/// Unified error type for Bayesian change point modeling.
///
/// Covers change-probability and prior validation, observation-matrix
/// checks, capacity configuration, iterative re-estimation failures, and
/// sampling failures bubbled up from `statrs`/`rand`. Implements
/// `Display`/`Error` and converts to a Python `ValueError` at PyO3
/// boundaries.
#[derive(Debug, Clone, PartialEq)]
pub enum BCPMError {
    // ---- Input/data validation ----
    /// Observation sequence is empty.
    EmptySeries,

    /// Observation row width differs from `m + n`.
    ObsWidthMismatch { expected: usize, actual: usize },

    /// An observation entry is NaN/±inf.
    NonFiniteObservation { row: usize, col: usize, value: f64 },

    /// An observation entry is negative (counts must be ≥ 0).
    NegativeObservation { row: usize, col: usize, value: f64 },

    // ---- Model configuration ----
    /// Change probability must be finite with 0 ≤ p1 < 1.
    InvalidChangeProb { value: f64 },

    /// Prior has no feature blocks (m = 0 and n = 0).
    EmptyPrior,

    /// Dirichlet concentration must be finite and > 0.
    InvalidDirichletParam { index: usize, value: f64 },

    /// Gamma shape must be finite and > 0.
    InvalidGammaShape { index: usize, value: f64 },

    /// Gamma scale must be finite and > 0.
    InvalidGammaScale { index: usize, value: f64 },

    /// Gamma shape and scale vectors must have equal length.
    GammaLengthMismatch { a_len: usize, b_len: usize },

    /// Message capacity must be ≥ 1.
    ZeroCapacity,

    // ---- Sufficient statistics / re-estimation ----
    /// Sufficient-statistics vector length differs from `m + 2n`.
    SsLengthMismatch { expected: usize, actual: usize },

    /// An iterative solve failed to reach tolerance.
    NonConvergence { routine: &'static str, iterations: usize },

    // ---- Sampling ----
    /// A latent state coordinate passed to the observation sampler is
    /// non-finite or out of domain.
    InvalidLatentState { index: usize, value: f64 },

    /// statrs rejected a Gamma distribution parameterization.
    InvalidGammaDistribution,

    /// statrs rejected a Poisson rate.
    InvalidPoissonRate,

    /// Categorical weights were rejected (all zero, negative, or non-finite).
    InvalidCategoricalWeights,

    // ---- Recursion windows ----
    /// Backward window does not fit the sequence: requires
    /// `1 ≤ length ≤ start + 1` and `start < len`.
    InvalidWindow { start: usize, length: usize, len: usize },

    // ---- Persistence ----
    /// Flat parameter vector has the wrong length for the encoded (m, n).
    FlatLengthMismatch { expected: usize, actual: usize },

    /// A flat-vector dimension entry is negative or non-integral.
    InvalidDimensionEntry { value: f64 },

    /// ---- Fallback ----
    UnknownError,
}

impl std::error::Error for BCPMError {}

impl std::fmt::Display for BCPMError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Input/data validation ----
            BCPMError::EmptySeries => {
                write!(f, "Observation sequence is empty.")
            }
            BCPMError::ObsWidthMismatch { expected, actual } => {
                write!(f, "Observation width mismatch: expected m + n = {expected}, got {actual}")
            }
            BCPMError::NonFiniteObservation { row, col, value } => {
                write!(f, "Observation at ({row}, {col}) is non-finite: {value}")
            }
            BCPMError::NegativeObservation { row, col, value } => {
                write!(f, "Observation at ({row}, {col}) is negative: {value}")
            }
            // ---- Model configuration ----
            BCPMError::InvalidChangeProb { value } => {
                write!(f, "Change probability must be finite with 0 <= p1 < 1; got: {value}")
            }
            BCPMError::EmptyPrior => {
                write!(f, "Prior must have at least one feature block (m + n >= 1).")
            }
            BCPMError::InvalidDirichletParam { index, value } => {
                write!(
                    f,
                    "Dirichlet concentration at index {index} must be finite and > 0; got: {value}"
                )
            }
            BCPMError::InvalidGammaShape { index, value } => {
                write!(f, "Gamma shape at index {index} must be finite and > 0; got: {value}")
            }
            BCPMError::InvalidGammaScale { index, value } => {
                write!(f, "Gamma scale at index {index} must be finite and > 0; got: {value}")
            }
            BCPMError::GammaLengthMismatch { a_len, b_len } => {
                write!(f, "Gamma shape/scale length mismatch: shapes {a_len}, scales {b_len}")
            }
            BCPMError::ZeroCapacity => {
                write!(f, "Message capacity max_k must be >= 1.")
            }
            // ---- Sufficient statistics / re-estimation ----
            BCPMError::SsLengthMismatch { expected, actual } => {
                write!(
                    f,
                    "Sufficient-statistics length mismatch: expected m + 2n = {expected}, got {actual}"
                )
            }
            BCPMError::NonConvergence { routine, iterations } => {
                write!(f, "{routine} failed to converge after {iterations} iterations")
            }
            // ---- Sampling ----
            BCPMError::InvalidLatentState { index, value } => {
                write!(f, "Latent state coordinate at index {index} is out of domain: {value}")
            }
            BCPMError::InvalidGammaDistribution => {
                write!(f, "Gamma distribution requires finite shape > 0 and rate > 0.")
            }
            BCPMError::InvalidPoissonRate => {
                write!(f, "Poisson distribution requires a finite rate > 0.")
            }
            BCPMError::InvalidCategoricalWeights => {
                write!(f, "Categorical weights must be nonnegative, finite, and not all zero.")
            }
            // ---- Recursion windows ----
            BCPMError::InvalidWindow { start, length, len } => {
                write!(
                    f,
                    "Backward window (start {start}, length {length}) does not fit a sequence of length {len}"
                )
            }
            // ---- Persistence ----
            BCPMError::FlatLengthMismatch { expected, actual } => {
                write!(f, "Flat parameter vector length mismatch: expected {expected}, got {actual}")
            }
            BCPMError::InvalidDimensionEntry { value } => {
                write!(f, "Flat vector dimension entry must be a nonnegative integer; got: {value}")
            }
            BCPMError::UnknownError => {
                write!(f, "An unknown error occurred in the change point model.")
            }
        }
    }
}

/// Convert a [`BCPMError`] into a Python `ValueError` with the error message.
///
/// This is used at the Rust↔Python boundary to surface domain errors cleanly.
#[cfg(feature = "python-bindings")]
impl std::convert::From<BCPMError> for PyErr {
    fn from(err: BCPMError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

impl From<GammaError> for BCPMError {
    fn from(_: GammaError) -> BCPMError {
        BCPMError::InvalidGammaDistribution
    }
}

impl From<PoissonError> for BCPMError {
    fn from(_: PoissonError) -> BCPMError {
        BCPMError::InvalidPoissonRate
    }
}

impl From<rand::distributions::WeightedError> for BCPMError {
    fn from(_: rand::distributions::WeightedError) -> BCPMError {
        BCPMError::InvalidCategoricalWeights
    }
}

/// Errors specific to the flat-text persistence layer.
///
/// Typical causes include missing files, malformed numeric lines, and
/// header/shape disagreements in the `[ndim, shape..., data...]` format.
#[derive(Debug)]
pub enum PersistError {
    /// Underlying filesystem failure.
    Io(std::io::Error),

    /// A line could not be parsed as a finite f64.
    Parse { line: usize },

    /// The ndim/shape header is missing, non-integral, or unsupported.
    BadHeader { reason: &'static str },

    /// Header shape disagrees with the number of data lines.
    ShapeMismatch { expected: usize, actual: usize },

    /// The file parsed cleanly but encodes an invalid model.
    Model(BCPMError),
}

impl std::error::Error for PersistError {}

impl std::fmt::Display for PersistError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistError::Io(err) => {
                write!(f, "I/O error: {err}")
            }
            PersistError::Parse { line } => {
                write!(f, "Could not parse line {line} as a finite number")
            }
            PersistError::BadHeader { reason } => {
                write!(f, "Malformed array header: {reason}")
            }
            PersistError::ShapeMismatch { expected, actual } => {
                write!(f, "Array shape mismatch: header promises {expected} values, found {actual}")
            }
            PersistError::Model(err) => {
                write!(f, "File encodes an invalid model: {err}")
            }
        }
    }
}

impl From<std::io::Error> for PersistError {
    fn from(err: std::io::Error) -> PersistError {
        PersistError::Io(err)
    }
}

impl From<BCPMError> for PersistError {
    fn from(err: BCPMError) -> PersistError {
        PersistError::Model(err)
    }
}

#[cfg(feature = "python-bindings")]
impl std::convert::From<PersistError> for PyErr {
    fn from(err: PersistError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}
