//! bcpm — online Bayesian change point detection with Python bindings.
//!
//! Purpose
//! -------
//! Serve as the crate root for Rust callers and as the PyO3 bridge that
//! exposes the change point stack to Python. When the `python-bindings`
//! feature is enabled, this module defines the Python-facing classes
//! ([`BCPM`], [`BCPMEstimate`]) and the module initializer for the
//! compiled extension.
//!
//! Key behaviors
//! -------------
//! - Re-export the core Rust module ([`changepoint`]) as the public crate
//!   surface.
//! - Define `#[pyclass]` wrappers and the `#[pymodule]` initializer so
//!   Python callers can construct models, run the three readouts, score
//!   estimates, and persist everything.
//!
//! Invariants & assumptions
//! ------------------------
//! - All heavy numerical work is implemented in [`changepoint`]; this
//!   file performs only FFI glue, input conversion, and error mapping.
//! - When `python-bindings` is enabled, the Python-visible types mirror
//!   the invariants and signatures of their Rust counterparts
//!   ([`ChangePointModel`], [`Estimate`]).
//!
//! Conventions
//! -----------
//! - Errors from core Rust code are propagated as rich error types
//!   internally and converted to `ValueError` at the PyO3 boundary.
//! - Matrix results cross the boundary as row-major `Vec<Vec<f64>>`;
//!   matrix inputs accept numpy arrays, pandas frames, or nested
//!   sequences (see [`utils`]).
//!
//! Testing notes
//! -------------
//! - Core numerical behavior is covered by unit tests in the inner
//!   modules and by the integration tests under `tests/`; the PyO3 layer
//!   is exercised by Python-side smoke tests in downstream packaging.
//!
//! [`ChangePointModel`]: changepoint::models::bcpm::ChangePointModel
//! [`Estimate`]: changepoint::core::data::Estimate

pub mod changepoint;
pub mod utils;

#[cfg(feature = "python-bindings")]
use pyo3::{prelude::*, types::PyAny};

#[cfg(feature = "python-bindings")]
use ndarray::Array1;

#[cfg(feature = "python-bindings")]
use rand::{rngs::StdRng, SeedableRng};

#[cfg(feature = "python-bindings")]
use std::path::Path;

#[cfg(feature = "python-bindings")]
use crate::{
    changepoint::{
        core::data::{Estimate, DEFAULT_THRESHOLD, DEFAULT_WINDOW},
        models::bcpm::ChangePointModel,
    },
    utils::{extract_f64_matrix, extract_f64_vector},
};

/// BCPM — Python-facing wrapper for the change point model.
///
/// Purpose
/// -------
/// Expose the [`ChangePointModel`] API to Python callers while preserving
/// the core Rust invariants and error handling.
///
/// Key behaviors
/// -------------
/// - Build a model from a change probability and prior block parameters
///   (or default priors for given block sizes via `BCPM.default`).
/// - Provide `filter`, `smooth`, and `online_smooth` methods that convert
///   Python arrays into observation matrices and delegate to the core
///   implementation, returning a [`BCPMEstimate`].
/// - Generate synthetic experiments and round-trip parameters through
///   the flat text format.
///
/// Parameters
/// ----------
/// Constructed from Python via `BCPM(p1, alpha=None, a=None, b=None,
/// max_k=None)`:
/// - `p1`: `f64`
///   Change probability, `0 ≤ p1 < 1`.
/// - `alpha`: optional 1-D array-like
///   Dirichlet concentrations for the categorical block (length m).
/// - `a`, `b`: optional 1-D array-likes
///   Gamma shapes and scales for the Poisson block (length n each).
/// - `max_k`: `Option<usize>`
///   Mixture capacity per message; defaults to 100.
///
/// Fields
/// ------
/// - `inner`: [`ChangePointModel`]
///   Fully validated model owning the prior and configuration.
///
/// Invariants
/// ----------
/// - `inner` is always a well-formed [`ChangePointModel`]; every
///   construction path goes through the core validators.
///
/// Notes
/// -----
/// - Native Rust callers should use [`ChangePointModel`] directly; this
///   type exists solely for the PyO3 binding surface.
#[cfg(feature = "python-bindings")]
#[pyclass(module = "bcpm")]
pub struct BCPM {
    /// Underlying Rust model.
    pub inner: ChangePointModel,
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl BCPM {
    #[new]
    #[pyo3(
        signature = (p1, alpha = None, a = None, b = None, max_k = None),
        text_signature = "(p1, /, alpha=None, a=None, b=None, max_k=None)"
    )]
    pub fn new<'py>(
        py: Python<'py>, p1: f64, alpha: Option<&Bound<'py, PyAny>>,
        a: Option<&Bound<'py, PyAny>>, b: Option<&Bound<'py, PyAny>>, max_k: Option<usize>,
    ) -> PyResult<Self> {
        let alpha = match alpha {
            Some(raw) => extract_f64_vector(py, raw)?,
            None => Array1::zeros(0),
        };
        let a = match a {
            Some(raw) => extract_f64_vector(py, raw)?,
            None => Array1::zeros(0),
        };
        let b = match b {
            Some(raw) => extract_f64_vector(py, raw)?,
            None => Array1::zeros(0),
        };
        let mut inner = ChangePointModel::new(p1, alpha, a, b)?;
        if let Some(max_k) = max_k {
            inner = inner.with_max_k(max_k)?;
        }
        Ok(BCPM { inner })
    }

    /// Build a model with the default prior for the given block sizes.
    #[staticmethod]
    #[pyo3(
        signature = (p1, m, n, max_k = None),
        text_signature = "(p1, m, n, /, max_k=None)"
    )]
    pub fn default(p1: f64, m: usize, n: usize, max_k: Option<usize>) -> PyResult<Self> {
        let mut inner = ChangePointModel::default_model(p1, m, n)?;
        if let Some(max_k) = max_k {
            inner = inner.with_max_k(max_k)?;
        }
        Ok(BCPM { inner })
    }

    /// Causal filtering over a T × (m + n) observation matrix.
    pub fn filter<'py>(&self, py: Python<'py>, obs: &Bound<'py, PyAny>) -> PyResult<BCPMEstimate> {
        let obs = extract_f64_matrix(py, obs)?;
        Ok(BCPMEstimate { inner: self.inner.filter(obs.view())? })
    }

    /// Fixed-interval smoothing over a T × (m + n) observation matrix.
    pub fn smooth<'py>(&self, py: Python<'py>, obs: &Bound<'py, PyAny>) -> PyResult<BCPMEstimate> {
        let obs = extract_f64_matrix(py, obs)?;
        Ok(BCPMEstimate { inner: self.inner.smooth(obs.view())? })
    }

    /// Fixed-lag smoothing; `lag = 0` is filtering, `lag ≥ T` is full
    /// smoothing.
    #[pyo3(text_signature = "(self, obs, lag, /)")]
    pub fn online_smooth<'py>(
        &self, py: Python<'py>, obs: &Bound<'py, PyAny>, lag: usize,
    ) -> PyResult<BCPMEstimate> {
        let obs = extract_f64_matrix(py, obs)?;
        Ok(BCPMEstimate { inner: self.inner.online_smooth(obs.view(), lag)? })
    }

    /// Sample `t` steps from the generative model.
    ///
    /// Returns `(cps, states, obs)`: binary change indicators, the latent
    /// state sequence, and the observation sequence (row-major).
    #[pyo3(
        signature = (t, seed = None),
        text_signature = "(self, t, /, seed=None)"
    )]
    pub fn generate_data(
        &self, t: usize, seed: Option<u64>,
    ) -> PyResult<(Vec<u8>, Vec<Vec<f64>>, Vec<Vec<f64>>)> {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let data = self.inner.generate_data(t, &mut rng)?;
        let states = data.h.rows().into_iter().map(|row| row.to_vec()).collect();
        let obs = data.v.rows().into_iter().map(|row| row.to_vec()).collect();
        Ok((data.s.to_vec(), states, obs))
    }

    /// The flat parameter vector `[p1, m, n, alpha…, a…, b…]`.
    pub fn to_flat(&self) -> Vec<f64> {
        self.inner.to_flat().to_vec()
    }

    /// Write the flat parameter vector to `path` in the text format.
    pub fn save(&self, path: &str) -> PyResult<()> {
        self.inner.save(Path::new(path))?;
        Ok(())
    }

    /// Load a model saved by `save`.
    #[staticmethod]
    pub fn load(path: &str) -> PyResult<Self> {
        Ok(BCPM { inner: ChangePointModel::load(Path::new(path))? })
    }

    #[getter]
    pub fn p1(&self) -> f64 {
        self.inner.change_prob().p1()
    }

    #[setter]
    pub fn set_p1(&mut self, p1: f64) -> PyResult<()> {
        self.inner.set_change_prob(p1)?;
        Ok(())
    }

    #[getter]
    pub fn m(&self) -> usize {
        self.inner.m()
    }

    #[getter]
    pub fn n(&self) -> usize {
        self.inner.n()
    }

    #[getter]
    pub fn max_k(&self) -> usize {
        self.inner.max_k()
    }
}

/// BCPMEstimate — inference output exposed to Python.
///
/// Purpose
/// -------
/// Present the per-step changepoint probabilities, posterior means, and
/// log-likelihood of one readout, plus evaluation against ground truth.
///
/// Key behaviors
/// -------------
/// - Expose `cpp`, `mean`, `log_likelihood`, and `score` as
///   copy-on-access properties.
/// - Score against a ground-truth indicator sequence with the windowed
///   F-score via `evaluate`.
/// - Persist all result arrays under a directory via `save`.
///
/// Parameters
/// ----------
/// Instances are constructed internally by the readout methods on
/// [`BCPM`] and are not created directly by user code.
///
/// Fields
/// ------
/// - `inner`: [`Estimate`]
///   Rust-side result container.
///
/// Notes
/// -----
/// - Rust callers should use [`Estimate`] directly; this wrapper exists
///   solely for the PyO3 binding.
#[cfg(feature = "python-bindings")]
#[pyclass(module = "bcpm")]
pub struct BCPMEstimate {
    /// Underlying Rust result container.
    pub inner: Estimate,
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl BCPMEstimate {
    #[getter]
    pub fn cpp(&self) -> Vec<f64> {
        self.inner.cpp.to_vec()
    }

    #[getter]
    pub fn mean(&self) -> Vec<Vec<f64>> {
        self.inner.mean.rows().into_iter().map(|row| row.to_vec()).collect()
    }

    #[getter]
    pub fn log_likelihood(&self) -> f64 {
        self.inner.log_likelihood
    }

    #[getter]
    pub fn score(&self) -> Option<f64> {
        self.inner.score
    }

    /// F-score of the changepoint probabilities against ground-truth
    /// indicators; stores the score on the estimate and returns it.
    #[pyo3(
        signature = (cps, threshold = None, window = None),
        text_signature = "(self, cps, /, threshold=0.99, window=10)"
    )]
    pub fn evaluate<'py>(
        &mut self, py: Python<'py>, cps: &Bound<'py, PyAny>, threshold: Option<f64>,
        window: Option<usize>,
    ) -> PyResult<f64> {
        let cps = extract_f64_vector(py, cps)?.mapv(|v| u8::from(v != 0.0));
        Ok(self.inner.evaluate(
            cps.view(),
            threshold.unwrap_or(DEFAULT_THRESHOLD),
            window.unwrap_or(DEFAULT_WINDOW),
        ))
    }

    /// Write `cpp.txt`, `mean.txt`, `ll.txt`, and (if evaluated)
    /// `score.txt` under `dir`.
    pub fn save(&self, dir: &str) -> PyResult<()> {
        self.inner.save(Path::new(dir))?;
        Ok(())
    }
}

/// bcpm — PyO3 module initializer for the Python extension.
///
/// Registers the Python-facing classes on the compiled `bcpm` module.
/// Invoked automatically by Python on import; not called by user code.
#[cfg(feature = "python-bindings")]
#[pymodule]
fn bcpm<'py>(_py: Python<'py>, m: &Bound<'py, PyModule>) -> PyResult<()> {
    m.add_class::<BCPM>()?;
    m.add_class::<BCPMEstimate>()?;
    Ok(())
}
