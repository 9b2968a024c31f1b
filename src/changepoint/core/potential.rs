//! Conjugate-prior potentials over the latent state.
//!
//! A [`Potential`] is the atomic unit of the message algebra: an
//! unnormalized product of conjugate priors over a latent state split into
//! an m-dimensional categorical block (Dirichlet concentrations `alpha`)
//! and an n-dimensional Poisson-rate block (Gamma shapes `a` and *scales*
//! `b`), together with a scalar log-weight `log_c` carrying its evidence
//! contribution.
//!
//! ## Key behaviors
//! - [`Potential::multiply`] performs the closed-form conjugate product,
//!   folding the normalizing-constant corrections of both blocks into
//!   `log_c`. It is commutative and associative up to rounding.
//! - [`Potential::from_observation`] lifts a single count vector into a
//!   likelihood factor via the conjugate sufficient statistics (`+1`
//!   offsets keep all parameters strictly positive by construction).
//! - [`Potential::sufficient_statistics`] / [`Potential::fit`] expose and
//!   consume expected natural-parameter statistics for moment-based
//!   re-estimation of a prior from a weighted mixture.
//!
//! ## Invariants & assumptions
//! - Block lengths (m, n) are fixed per model and never change after
//!   construction; an absent block is a zero-length array and every
//!   operation is a no-op on it.
//! - `b` is a Gamma **scale**, so the Poisson-block mean is `a·b`
//!   elementwise and sampling maps to `statrs` with rate `1/b`.
//! - Potentials are immutable in effect: `multiply` and `reweighted`
//!   return new values; nothing mutates an operand in place.
//! - Multiplying potentials with mismatched block shapes is a logic bug
//!   (the owning model has fixed dimensions) and panics.
use ndarray::{s, Array1, ArrayView1};
use rand::distributions::Distribution;
use rand::Rng;
use statrs::distribution::Gamma as GammaDist;
use statrs::function::gamma::{digamma, ln_gamma};

use crate::changepoint::core::numerics::{fit_dirichlet_from_ss, fit_gamma_from_ss, normalize};
use crate::changepoint::core::validation::{validate_obs_row, validate_ss_len};
use crate::changepoint::errors::BCPMResult;

/// Unnormalized conjugate factor over the latent state, with log-weight.
///
/// See the module docs for the block conventions. Component ordering in
/// concatenated outputs (means, samples, sufficient statistics) is always
/// categorical block first, Poisson block second.
#[derive(Debug, Clone, PartialEq)]
pub struct Potential {
    /// Dirichlet concentrations, length m (empty when m = 0).
    pub alpha: Array1<f64>,
    /// Gamma shapes, length n (empty when n = 0).
    pub a: Array1<f64>,
    /// Gamma scales, length n (empty when n = 0).
    pub b: Array1<f64>,
    /// Log of the factor's unnormalized weight.
    pub log_c: f64,
}

impl Potential {
    /// Construct a potential from raw block parameters and a log-weight.
    ///
    /// Callers are responsible for the positivity of the parameters; the
    /// model validates its prior once at construction and observation
    /// factors are positive by the `+1` offsets.
    pub fn new(alpha: Array1<f64>, a: Array1<f64>, b: Array1<f64>, log_c: f64) -> Self {
        Potential { alpha, a, b, log_c }
    }

    /// The default prior factor: flat Dirichlet (`alpha = 1⃗`) and a
    /// broad Gamma (`a = 10·1⃗`, `b = 1⃗`), with unit weight.
    pub fn default_potential(m: usize, n: usize) -> Self {
        Potential {
            alpha: Array1::ones(m),
            a: Array1::from_elem(n, 10.0),
            b: Array1::ones(n),
            log_c: 0.0,
        }
    }

    /// Build a single-observation likelihood factor from a length-(m+n)
    /// count vector.
    ///
    /// Categorical block: `alpha = obs[0..m] + 1` with
    /// `log_c = lnΓ(∑obs + 1) − lnΓ(∑obs + m)` (the multinomial
    /// normalization). Poisson block: `a = obs[m..] + 1`, `b = 1⃗`.
    ///
    /// # Errors
    /// Rejects rows whose width differs from `m + n` or that contain
    /// negative/non-finite entries.
    pub fn from_observation(obs: ArrayView1<f64>, m: usize, n: usize) -> BCPMResult<Self> {
        validate_obs_row(obs, m + n)?;
        let mut log_c = 0.0;
        let alpha = if m > 0 {
            let cat = obs.slice(s![..m]);
            let sum_obs = cat.sum();
            log_c = ln_gamma(sum_obs + 1.0) - ln_gamma(sum_obs + m as f64);
            cat.mapv(|v| v + 1.0)
        } else {
            Array1::zeros(0)
        };
        let (a, b) = if n > 0 {
            (obs.slice(s![m..]).mapv(|v| v + 1.0), Array1::ones(n))
        } else {
            (Array1::zeros(0), Array1::zeros(0))
        };
        Ok(Potential { alpha, a, b, log_c })
    }

    /// Closed-form conjugate product of two potentials.
    ///
    /// Dirichlet block: `alpha₃ = alpha₁ + alpha₂ − 1`, with the
    /// log-weight correction
    /// `lnΓ(∑α₁) − ∑lnΓ(α₁) + lnΓ(∑α₂) − ∑lnΓ(α₂) + ∑lnΓ(α₃) − lnΓ(∑α₃)`.
    ///
    /// Gamma block: `a₃ = a₁ + a₂ − 1`, `b₃ = b₁b₂/(b₁ + b₂)`
    /// elementwise, with correction
    /// `∑[lnΓ(a₃) + a₃·ln b₃] − ∑[lnΓ(a₁) + a₁·ln b₁] − ∑[lnΓ(a₂) + a₂·ln b₂]`.
    ///
    /// The result's `log_c` is the sum of both operands' log-weights plus
    /// the corrections. Commutative; associative up to rounding.
    ///
    /// # Panics
    /// If the operands' block shapes differ — the owning model has fixed
    /// dimensions, so a mismatch is a logic bug.
    pub fn multiply(&self, other: &Potential) -> Potential {
        assert_eq!(
            self.alpha.len(),
            other.alpha.len(),
            "categorical block length mismatch in potential product"
        );
        assert_eq!(
            self.a.len(),
            other.a.len(),
            "Poisson block length mismatch in potential product"
        );

        let mut log_c = self.log_c + other.log_c;

        let alpha = if self.alpha.is_empty() {
            Array1::zeros(0)
        } else {
            let alpha = &self.alpha + &other.alpha - 1.0;
            log_c += ln_gamma(self.alpha.sum()) - self.alpha.mapv(ln_gamma).sum();
            log_c += ln_gamma(other.alpha.sum()) - other.alpha.mapv(ln_gamma).sum();
            log_c += alpha.mapv(ln_gamma).sum() - ln_gamma(alpha.sum());
            alpha
        };

        let (a, b) = if self.a.is_empty() {
            (Array1::zeros(0), Array1::zeros(0))
        } else {
            let a = &self.a + &other.a - 1.0;
            let b = (&self.b * &other.b) / (&self.b + &other.b);
            for i in 0..a.len() {
                log_c += ln_gamma(a[i]) + a[i] * b[i].ln();
                log_c -= ln_gamma(self.a[i]) + self.a[i] * self.b[i].ln();
                log_c -= ln_gamma(other.a[i]) + other.a[i] * other.b[i].ln();
            }
            (a, b)
        };

        Potential { alpha, a, b, log_c }
    }

    /// Copy of this potential with `offset` added to its log-weight.
    ///
    /// Used by the recursions to tag change / no-change hypotheses with
    /// `log(p1)` / `log(1 − p1)` without touching the shared original.
    pub fn reweighted(&self, offset: f64) -> Potential {
        Potential {
            alpha: self.alpha.clone(),
            a: self.a.clone(),
            b: self.b.clone(),
            log_c: self.log_c + offset,
        }
    }

    /// Latent-state dimensionality `m + n`.
    pub fn size(&self) -> usize {
        self.alpha.len() + self.a.len()
    }

    /// Posterior mean of the latent state under this factor: normalized
    /// `alpha` for the categorical block, `a·b` elementwise for the
    /// Poisson block, concatenated.
    pub fn mean(&self) -> Array1<f64> {
        let m = self.alpha.len();
        let n = self.a.len();
        let mut out = Array1::zeros(m + n);
        if m > 0 {
            out.slice_mut(s![..m]).assign(&normalize(self.alpha.view()));
        }
        if n > 0 {
            out.slice_mut(s![m..]).assign(&(&self.a * &self.b));
        }
        out
    }

    /// Draw one latent state: a Dirichlet sample from `alpha` (via
    /// normalized unit-scale Gamma draws) concatenated with independent
    /// Gamma(`a`, scale `b`) draws.
    ///
    /// # Errors
    /// Propagates `statrs` parameter rejections (cannot occur for a
    /// validated prior, but kept as errors rather than unwraps).
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> BCPMResult<Array1<f64>> {
        let m = self.alpha.len();
        let n = self.a.len();
        let mut out = Array1::zeros(m + n);
        if m > 0 {
            let mut draws = Array1::zeros(m);
            for i in 0..m {
                draws[i] = GammaDist::new(self.alpha[i], 1.0)?.sample(rng);
            }
            let total = draws.sum();
            out.slice_mut(s![..m]).assign(&draws.mapv(|v| v / total));
        }
        for i in 0..n {
            // statrs parameterizes Gamma by rate; b is a scale.
            out[m + i] = GammaDist::new(self.a[i], 1.0 / self.b[i])?.sample(rng);
        }
        Ok(out)
    }

    /// Expected natural-parameter sufficient statistics, length `m + 2n`:
    /// `ψ(α_i) − ψ(∑α)` per category, then `a_i·b_i` (means) and
    /// `ψ(a_i) + ln b_i` (mean-logs) per Poisson feature.
    pub fn sufficient_statistics(&self) -> Array1<f64> {
        let m = self.alpha.len();
        let n = self.a.len();
        let mut ss = Array1::zeros(m + 2 * n);
        if m > 0 {
            let psi_sum = digamma(self.alpha.sum());
            for i in 0..m {
                ss[i] = digamma(self.alpha[i]) - psi_sum;
            }
        }
        for i in 0..n {
            ss[m + i] = self.a[i] * self.b[i];
            ss[m + n + i] = digamma(self.a[i]) + self.b[i].ln();
        }
        ss
    }

    /// Re-estimate this potential's parameters from expected sufficient
    /// statistics (the layout produced by [`sufficient_statistics`]).
    ///
    /// The Dirichlet block uses the digamma-inverse fixed point; each
    /// Gamma feature solves `ln a − ψ(a) = ln(mean) − meanlog` by Newton
    /// iteration (no closed form exists).
    ///
    /// # Errors
    /// Rejects statistics vectors of the wrong length and propagates
    /// solver non-convergence.
    ///
    /// [`sufficient_statistics`]: Potential::sufficient_statistics
    pub fn fit(&mut self, ss: ArrayView1<f64>) -> BCPMResult<()> {
        let m = self.alpha.len();
        let n = self.a.len();
        validate_ss_len(ss.len(), m, n)?;
        if m > 0 {
            self.alpha = fit_dirichlet_from_ss(ss.slice(s![..m]))?;
        }
        for i in 0..n {
            let (shape, scale) = fit_gamma_from_ss(ss[m + i], ss[m + n + i])?;
            self.a[i] = shape;
            self.b[i] = scale;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changepoint::errors::BCPMError;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - The conjugate product (algebraic laws and a hand-checked Poisson
    //   update), observation lifting, means, and the ss/fit round trip.
    //
    // They intentionally DO NOT cover:
    // - Mixture-level bookkeeping (message tests) or recursion wiring
    //   (model and integration tests).
    // -------------------------------------------------------------------------

    fn mixed_potential(weights: (f64, f64, f64), log_c: f64) -> Potential {
        let (w0, w1, w2) = weights;
        Potential::new(array![w0, w1], array![w2], array![1.5], log_c)
    }

    #[test]
    // Purpose
    // -------
    // Verify the conjugate product is commutative and associative within
    // floating tolerance on mixed categorical + Poisson potentials.
    //
    // Given
    // -----
    // - Three potentials with distinct concentrations, shapes, scales, and
    //   log-weights.
    //
    // Expect
    // ------
    // - p1*p2 equals p2*p1 in every field within 1e-10.
    // - (p1*p2)*p3 equals p1*(p2*p3) within 1e-9.
    fn multiply_is_commutative_and_associative() {
        let p1 = mixed_potential((1.0, 2.0, 10.0), 0.3);
        let p2 = mixed_potential((3.0, 1.5, 4.0), -1.2);
        let p3 = mixed_potential((2.0, 2.0, 7.0), 2.0);

        let ab = p1.multiply(&p2);
        let ba = p2.multiply(&p1);
        assert!((ab.log_c - ba.log_c).abs() < 1e-10);
        for (x, y) in ab.alpha.iter().zip(ba.alpha.iter()) {
            assert!((x - y).abs() < 1e-10);
        }

        let left = p1.multiply(&p2).multiply(&p3);
        let right = p1.multiply(&p2.multiply(&p3));
        assert!((left.log_c - right.log_c).abs() < 1e-9);
        for (x, y) in left.b.iter().zip(right.b.iter()) {
            assert!((x - y).abs() < 1e-10);
        }
    }

    #[test]
    // Purpose
    // -------
    // Hand-check a pure-Poisson conjugate update: Gamma(10, 1) prior times
    // the factor for a single count of 5.
    //
    // Given
    // -----
    // - Prior a = [10], b = [1]; observation factor from obs = [5]
    //   (a = [6], b = [1]).
    //
    // Expect
    // ------
    // - Product has a = [15], b = [0.5], mean 7.5.
    // - The log-weight equals the Poisson-Gamma marginal correction
    //   lnΓ(15) + 15·ln(0.5) − lnΓ(10) − lnΓ(6).
    fn poisson_update_matches_hand_computation() {
        let prior = Potential::new(array![], array![10.0], array![1.0], 0.0);
        let obs = Potential::from_observation(array![5.0].view(), 0, 1)
            .expect("valid single-count observation");
        assert_eq!(obs.a, array![6.0]);
        assert_eq!(obs.log_c, 0.0);

        let post = prior.multiply(&obs);
        assert_eq!(post.a, array![15.0]);
        assert!((post.b[0] - 0.5).abs() < 1e-15);
        assert!((post.mean()[0] - 7.5).abs() < 1e-12);

        let expected =
            ln_gamma(15.0) + 15.0 * 0.5_f64.ln() - ln_gamma(10.0) - ln_gamma(6.0);
        assert!((post.log_c - expected).abs() < 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Verify the categorical observation factor applies the +1 offset and
    // the multinomial normalization log-weight.
    //
    // Given
    // -----
    // - obs = [2, 0, 3] with m = 3, n = 0 (sum = 5).
    //
    // Expect
    // ------
    // - alpha = [3, 1, 4], empty Gamma block.
    // - log_c = lnΓ(6) − lnΓ(8).
    fn categorical_observation_factor_is_correct() {
        let p = Potential::from_observation(array![2.0, 0.0, 3.0].view(), 3, 0)
            .expect("valid count row");
        assert_eq!(p.alpha, array![3.0, 1.0, 4.0]);
        assert!(p.a.is_empty());
        let expected = ln_gamma(6.0) - ln_gamma(8.0);
        assert!((p.log_c - expected).abs() < 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Confirm observation lifting rejects rows with the wrong width.
    //
    // Given
    // -----
    // - obs = [1, 2] against m = 2, n = 1.
    //
    // Expect
    // ------
    // - Err(ObsWidthMismatch { expected: 3, actual: 2 }).
    fn observation_width_is_enforced() {
        let err = Potential::from_observation(array![1.0, 2.0].view(), 2, 1);
        assert!(matches!(err, Err(BCPMError::ObsWidthMismatch { expected: 3, actual: 2 })));
    }

    #[test]
    // Purpose
    // -------
    // Verify mean concatenates a normalized categorical block with the
    // Gamma means.
    //
    // Given
    // -----
    // - alpha = [1, 3], a = [4], b = [0.5].
    //
    // Expect
    // ------
    // - mean = [0.25, 0.75, 2.0].
    fn mean_concatenates_blocks() {
        let p = Potential::new(array![1.0, 3.0], array![4.0], array![0.5], 0.0);
        let mean = p.mean();
        assert!((mean[0] - 0.25).abs() < 1e-15);
        assert!((mean[1] - 0.75).abs() < 1e-15);
        assert!((mean[2] - 2.0).abs() < 1e-15);
    }

    #[test]
    // Purpose
    // -------
    // Round-trip moment-based re-estimation: fitting a fresh potential to
    // the sufficient statistics of a known one recovers its parameters.
    //
    // Given
    // -----
    // - Source: alpha = [2, 5], a = [3.5], b = [2.0].
    // - Target: the default potential of the same shape.
    //
    // Expect
    // ------
    // - After fit, the target's parameters match the source within 1e-5.
    fn fit_recovers_parameters_from_own_statistics() {
        let source = Potential::new(array![2.0, 5.0], array![3.5], array![2.0], 0.0);
        let ss = source.sufficient_statistics();
        assert_eq!(ss.len(), 2 + 2);

        let mut target = Potential::default_potential(2, 1);
        target.fit(ss.view()).expect("fit should converge on exact statistics");
        for (got, want) in target.alpha.iter().zip(source.alpha.iter()) {
            assert!((got - want).abs() < 1e-5, "alpha: expected {want}, got {got}");
        }
        assert!((target.a[0] - 3.5).abs() < 1e-5);
        assert!((target.b[0] - 2.0).abs() < 1e-5);
    }

    #[test]
    // Purpose
    // -------
    // Check sampling produces a simplex point for the categorical block
    // and strictly positive rates for the Poisson block.
    //
    // Given
    // -----
    // - alpha = [2, 2, 2], a = [10], b = [1], a seeded StdRng.
    //
    // Expect
    // ------
    // - The first three coordinates are in (0, 1) and sum to 1 within
    //   1e-12; the last coordinate is positive and finite.
    fn sample_respects_block_domains() {
        use rand::SeedableRng;
        let p = Potential::new(array![2.0, 2.0, 2.0], array![10.0], array![1.0], 0.0);
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let draw = p.sample(&mut rng).expect("sampling a valid potential succeeds");
        let simplex_sum: f64 = draw.iter().take(3).sum();
        assert!((simplex_sum - 1.0).abs() < 1e-12);
        assert!(draw.iter().take(3).all(|&v| v > 0.0 && v < 1.0));
        assert!(draw[3] > 0.0 && draw[3].is_finite());
    }
}
