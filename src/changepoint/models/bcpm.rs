//! Bayesian change point model over categorical + Poisson count streams.
//!
//! [`ChangePointModel`] owns the generative assumptions — a reset
//! probability `p1`, a conjugate prior [`Potential`] over the latent
//! state, and a mixture capacity — and exposes the message-passing
//! recursions built on them:
//!
//! - [`forward`]: predict/update sweep producing one bounded posterior
//!   [`Message`] per step.
//! - [`backward`]: likelihood recursion over a trailing window, used by
//!   the smoothers.
//! - [`filter`] / [`smooth`] / [`online_smooth`]: the three readouts,
//!   each returning an [`Estimate`] with per-step changepoint
//!   probabilities, posterior means, and the sequence log-likelihood.
//!
//! The model can also *generate* synthetic experiments
//! ([`generate_data`]) and round-trip its parameters through a flat
//! vector and the text persistence layer ([`to_flat`], [`save`]).
//!
//! ## Key behaviors
//! - In every predict message the change hypothesis is inserted first, so
//!   slot 0 — the slot the eviction heap never touches — always holds it.
//!   `change_point_probability(1)` on a filtering posterior and
//!   `change_point_probability(k)` on a smoothing product both rely on
//!   this ordering.
//! - All weights live in log domain; `p1 = 0` is legal and flows through
//!   as `-inf` log-weights that softmax sends to zero mass.
//!
//! ## Invariants & assumptions
//! - `m`, `n`, and the prior are fixed at construction; only the change
//!   probability can be swapped afterwards (by constructing a fresh
//!   [`ChangeProb`], never by mutating one).
//! - `online_smooth(lag = 0)` is exactly [`filter`]; `lag ≥ T` is exactly
//!   [`smooth`].
//!
//! [`forward`]: ChangePointModel::forward
//! [`backward`]: ChangePointModel::backward
//! [`filter`]: ChangePointModel::filter
//! [`smooth`]: ChangePointModel::smooth
//! [`online_smooth`]: ChangePointModel::online_smooth
//! [`generate_data`]: ChangePointModel::generate_data
//! [`to_flat`]: ChangePointModel::to_flat
//! [`save`]: ChangePointModel::save
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};
use rand::distributions::{Bernoulli, Distribution, WeightedIndex};
use rand::Rng;
use statrs::distribution::Poisson;
use std::path::Path;

use crate::changepoint::core::data::{Data, Estimate};
use crate::changepoint::core::message::{Message, DEFAULT_MAX_K};
use crate::changepoint::core::potential::Potential;
use crate::changepoint::core::validation::{
    validate_capacity, validate_change_prob, validate_latent_state, validate_obs_matrix,
    validate_prior,
};
use crate::changepoint::errors::{BCPMError, BCPMResult, PersistError};
use crate::changepoint::persistence::{read_vector, write_vector};

/// Number of categorical draws per generated observation row (the
/// multinomial total count).
pub const MULTINOMIAL_TRIALS: usize = 100;

/// Validated change probability with its log-domain forms precomputed.
///
/// Immutable by design: the recursions read `log_p1`/`log_p0` on every
/// step, so the three fields must never drift apart. Changing the
/// probability means building a new `ChangeProb`
/// ([`ChangePointModel::set_change_prob`] swaps the whole value).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeProb {
    p1: f64,
    log_p1: f64,
    log_p0: f64,
}

impl ChangeProb {
    /// Validate and wrap a change probability.
    ///
    /// `p1 = 0` is accepted and yields `log_p1 = -inf`, which the
    /// log-domain recursions handle (zero posterior mass on change).
    ///
    /// # Errors
    /// [`InvalidChangeProb`] unless `p1` is finite with `0 ≤ p1 < 1`.
    ///
    /// [`InvalidChangeProb`]: BCPMError::InvalidChangeProb
    pub fn new(p1: f64) -> BCPMResult<Self> {
        validate_change_prob(p1)?;
        Ok(ChangeProb { p1, log_p1: p1.ln(), log_p0: (1.0 - p1).ln() })
    }

    /// The probability of a change at any given step.
    pub fn p1(&self) -> f64 {
        self.p1
    }

    /// `ln(p1)`; `-inf` when `p1 = 0`.
    pub fn log_p1(&self) -> f64 {
        self.log_p1
    }

    /// `ln(1 − p1)`.
    pub fn log_p0(&self) -> f64 {
        self.log_p0
    }
}

/// Change point model: reset probability, conjugate prior, and capacity.
///
/// Observation rows have width `m + n`: `m` categorical counts followed
/// by `n` Poisson counts. See the module docs for the recursion overview.
#[derive(Debug, Clone)]
pub struct ChangePointModel {
    change_prob: ChangeProb,
    prior: Potential,
    m: usize,
    n: usize,
    max_k: usize,
}

impl ChangePointModel {
    /// Build a model from a change probability and prior block parameters.
    ///
    /// `m` and `n` are inferred from the parameter vector lengths; the
    /// prior's log-weight starts at zero. Capacity defaults to
    /// [`DEFAULT_MAX_K`]; see [`with_max_k`].
    ///
    /// # Errors
    /// Rejects out-of-domain change probabilities and malformed priors
    /// (empty, mismatched Gamma vectors, non-positive parameters).
    ///
    /// [`with_max_k`]: ChangePointModel::with_max_k
    pub fn new(
        p1: f64, alpha: Array1<f64>, a: Array1<f64>, b: Array1<f64>,
    ) -> BCPMResult<Self> {
        validate_prior(alpha.view(), a.view(), b.view())?;
        let m = alpha.len();
        let n = a.len();
        Ok(ChangePointModel {
            change_prob: ChangeProb::new(p1)?,
            prior: Potential::new(alpha, a, b, 0.0),
            m,
            n,
            max_k: DEFAULT_MAX_K,
        })
    }

    /// Build a model with the default prior for the given block sizes
    /// (flat Dirichlet, broad Gamma; see [`Potential::default_potential`]).
    pub fn default_model(p1: f64, m: usize, n: usize) -> BCPMResult<Self> {
        if m == 0 && n == 0 {
            return Err(BCPMError::EmptyPrior);
        }
        Ok(ChangePointModel {
            change_prob: ChangeProb::new(p1)?,
            prior: Potential::default_potential(m, n),
            m,
            n,
            max_k: DEFAULT_MAX_K,
        })
    }

    /// Set the mixture capacity, consuming and returning the model.
    ///
    /// # Errors
    /// [`ZeroCapacity`] for `max_k = 0`. Note `max_k = 1` is accepted but
    /// leaves no evictable slot beside the protected slot 0, so any
    /// recursion that overflows it panics; meaningful capacities start
    /// at 2.
    ///
    /// [`ZeroCapacity`]: BCPMError::ZeroCapacity
    pub fn with_max_k(mut self, max_k: usize) -> BCPMResult<Self> {
        validate_capacity(max_k)?;
        self.max_k = max_k;
        Ok(self)
    }

    /// Replace the change probability with a freshly validated one.
    pub fn set_change_prob(&mut self, p1: f64) -> BCPMResult<()> {
        self.change_prob = ChangeProb::new(p1)?;
        Ok(())
    }

    /// The validated change probability in all three forms.
    pub fn change_prob(&self) -> &ChangeProb {
        &self.change_prob
    }

    /// The conjugate prior over the latent state.
    pub fn prior(&self) -> &Potential {
        &self.prior
    }

    /// Categorical block size.
    pub fn m(&self) -> usize {
        self.m
    }

    /// Poisson block size.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Mixture capacity used by the recursions.
    pub fn max_k(&self) -> usize {
        self.max_k
    }

    /// Observation row width `m + n`.
    pub fn width(&self) -> usize {
        self.m + self.n
    }

    fn empty_message(&self) -> Message {
        // max_k was validated at construction / with_max_k.
        Message::new(self.max_k).expect("capacity validated at model construction")
    }

    /// One prediction step: propagate a posterior message through the
    /// change/no-change transition.
    ///
    /// The change hypothesis — the prior reweighted by
    /// `log(p1) + log-likelihood(alpha_prev)` — is inserted *first* so it
    /// occupies the protected slot 0. Every surviving component of
    /// `alpha_prev` follows, reweighted by `log(1 − p1)`.
    pub fn predict(&self, alpha_prev: &Message) -> Message {
        let mut message = self.empty_message();
        message.add_potential(
            self.prior.reweighted(self.change_prob.log_p1() + alpha_prev.log_likelihood()),
        );
        for p in alpha_prev.potentials() {
            message.add_potential(p.reweighted(self.change_prob.log_p0()));
        }
        message
    }

    /// One update step: absorb an observation row into every component of
    /// a predict message via the conjugate product.
    ///
    /// Insertion goes through the bounded [`Message::add_potential`], so
    /// the posterior respects the capacity (and slot 0 keeps the change
    /// hypothesis, now updated with the observation).
    ///
    /// # Errors
    /// Rejects rows of the wrong width or with negative/non-finite
    /// entries.
    pub fn update(&self, predict: &Message, obs: ArrayView1<f64>) -> BCPMResult<Message> {
        let p_obs = Potential::from_observation(obs, self.m, self.n)?;
        let mut message = self.empty_message();
        for p in predict.potentials() {
            message.add_potential(p.multiply(&p_obs));
        }
        Ok(message)
    }

    /// Full forward sweep: one (predict, posterior) message pair per step.
    ///
    /// Step 0 has no previous posterior; its predict message seeds the
    /// recursion with two prior copies — change-weighted (`log p1`,
    /// slot 0) and no-change-weighted (`log(1 − p1)`) — which is exactly
    /// [`predict`] applied to a virtual unit-evidence message holding the
    /// prior.
    ///
    /// # Errors
    /// Rejects empty or malformed observation matrices.
    ///
    /// [`predict`]: ChangePointModel::predict
    pub fn forward(&self, obs: ArrayView2<f64>) -> BCPMResult<(Vec<Message>, Vec<Message>)> {
        validate_obs_matrix(obs, self.width())?;
        let t = obs.nrows();
        let mut predictions = Vec::with_capacity(t);
        let mut posteriors: Vec<Message> = Vec::with_capacity(t);
        for i in 0..t {
            let predict_msg = if i == 0 {
                let mut message = self.empty_message();
                message.add_potential(self.prior.reweighted(self.change_prob.log_p1()));
                message.add_potential(self.prior.reweighted(self.change_prob.log_p0()));
                message
            } else {
                self.predict(&posteriors[i - 1])
            };
            let posterior = self.update(&predict_msg, obs.row(i))?;
            predictions.push(predict_msg);
            posteriors.push(posterior);
        }
        Ok((predictions, posteriors))
    }

    /// Backward (likelihood) recursion over the window
    /// `[start + 1 − length, start]`, returned in time order.
    ///
    /// Each step's message holds the observation factor for the "change
    /// happens next step" hypothesis in slot 0 — with the future evidence
    /// folded into its log-weight through a bounded temporary message of
    /// (next-step component × prior) products — followed by the
    /// no-change continuations (next-step component × observation
    /// factor, reweighted by `log(1 − p1)`).
    ///
    /// # Errors
    /// Rejects malformed observations and windows that do not satisfy
    /// `1 ≤ length ≤ start + 1` with `start` inside the sequence.
    pub fn backward(
        &self, obs: ArrayView2<f64>, start: usize, length: usize,
    ) -> BCPMResult<Vec<Message>> {
        validate_obs_matrix(obs, self.width())?;
        let t = obs.nrows();
        if length == 0 || start >= t || length > start + 1 {
            return Err(BCPMError::InvalidWindow { start, length, len: t });
        }

        let mut beta: Vec<Message> = Vec::with_capacity(length);
        for i in (start + 1 - length..=start).rev() {
            let p_obs = Potential::from_observation(obs.row(i), self.m, self.n)?;
            let mut message = self.empty_message();

            let mut pot_change = p_obs.clone();
            if let Some(next) = beta.last() {
                let mut temp = self.empty_message();
                for p in next.potentials() {
                    temp.add_potential(p.multiply(&self.prior));
                }
                pot_change.log_c += self.change_prob.log_p1() + temp.log_likelihood();
            }
            message.add_potential(pot_change);

            if let Some(next) = beta.last() {
                for p in next.potentials() {
                    let mut kept = p.multiply(&p_obs);
                    kept.log_c += self.change_prob.log_p0();
                    message.add_potential(kept);
                }
            }
            beta.push(message);
        }
        beta.reverse();
        Ok(beta)
    }

    /// Filtering readout: forward sweep only.
    ///
    /// Per step, the changepoint probability is the posterior mass of
    /// slot 0 (`change_point_probability(1)`) and the mean is the
    /// posterior mixture mean. The log-likelihood is the evidence of the
    /// final posterior.
    pub fn filter(&self, obs: ArrayView2<f64>) -> BCPMResult<Estimate> {
        let (_, posteriors) = self.forward(obs)?;
        let t = posteriors.len();
        let mut cpp = Array1::zeros(t);
        let mut mean = Array2::zeros((t, self.width()));
        for (i, message) in posteriors.iter().enumerate() {
            cpp[i] = message.change_point_probability(1);
            mean.row_mut(i).assign(&message.mean());
        }
        Ok(Estimate::new(cpp, mean, posteriors[t - 1].log_likelihood()))
    }

    /// Fixed-interval smoothing readout: forward + full-window backward.
    ///
    /// Per step, the smoothed message is the (unbounded) cross product of
    /// the predict message and the backward message, and the changepoint
    /// probability sums the first `|beta_i|` components — the pairings of
    /// the change hypothesis with every backward continuation.
    pub fn smooth(&self, obs: ArrayView2<f64>) -> BCPMResult<Estimate> {
        let (predictions, posteriors) = self.forward(obs)?;
        let t = obs.nrows();
        let beta = self.backward(obs, t - 1, t)?;
        let mut cpp = Array1::zeros(t);
        let mut mean = Array2::zeros((t, self.width()));
        for i in 0..t {
            let gamma = predictions[i].multiply(&beta[i]);
            cpp[i] = gamma.change_point_probability(beta[i].len());
            mean.row_mut(i).assign(&gamma.mean());
        }
        Ok(Estimate::new(cpp, mean, posteriors[t - 1].log_likelihood()))
    }

    /// Fixed-lag smoothing readout.
    ///
    /// `lag = 0` falls back to [`filter`]; `lag ≥ T` to [`smooth`].
    /// Otherwise each step `i ≤ T − lag` is smoothed against a fresh
    /// backward window of exactly `lag` future steps, and the trailing
    /// `lag − 1` steps reuse the suffix of the final window (their
    /// available future shrinks toward the filtering answer at `T − 1`).
    ///
    /// [`filter`]: ChangePointModel::filter
    /// [`smooth`]: ChangePointModel::smooth
    pub fn online_smooth(&self, obs: ArrayView2<f64>, lag: usize) -> BCPMResult<Estimate> {
        if lag == 0 {
            return self.filter(obs);
        }
        if lag >= obs.nrows() {
            return self.smooth(obs);
        }
        let (predictions, posteriors) = self.forward(obs)?;
        let t = obs.nrows();
        let mut cpp = Array1::zeros(t);
        let mut mean = Array2::zeros((t, self.width()));

        let mut beta = Vec::new();
        for i in 0..=t - lag {
            beta = self.backward(obs, i + lag - 1, lag)?;
            let gamma = predictions[i].multiply(&beta[0]);
            cpp[i] = gamma.change_point_probability(beta[0].len());
            mean.row_mut(i).assign(&gamma.mean());
        }
        // Trailing steps: not enough future for a full window, so reuse
        // the shrinking suffix of the last one.
        for j in 1..lag {
            let i = t - lag + j;
            let gamma = predictions[i].multiply(&beta[j]);
            cpp[i] = gamma.change_point_probability(beta[j].len());
            mean.row_mut(i).assign(&gamma.mean());
        }
        Ok(Estimate::new(cpp, mean, posteriors[t - 1].log_likelihood()))
    }

    /// Sample a synthetic experiment of `t` steps from the generative
    /// model: Bernoulli(`p1`) change indicators, latent states drawn from
    /// the prior at step 0 and at every change (carried over otherwise),
    /// and one observation row per state via [`rand_obs`].
    ///
    /// # Errors
    /// Propagates sampler parameter rejections; cannot occur for a
    /// validated model.
    ///
    /// [`rand_obs`]: ChangePointModel::rand_obs
    pub fn generate_data<R: Rng + ?Sized>(&self, t: usize, rng: &mut R) -> BCPMResult<Data> {
        let width = self.width();
        let mut s_seq = Array1::<u8>::zeros(t);
        let mut h = Array2::zeros((t, width));
        let mut v = Array2::zeros((t, width));
        let change = Bernoulli::new(self.change_prob.p1())
            .map_err(|_| BCPMError::InvalidChangeProb { value: self.change_prob.p1() })?;
        for i in 0..t {
            s_seq[i] = u8::from(change.sample(rng));
            if i == 0 || s_seq[i] == 1 {
                h.row_mut(i).assign(&self.prior.sample(rng)?);
            } else {
                let prev = h.row(i - 1).to_owned();
                h.row_mut(i).assign(&prev);
            }
            let obs = self.rand_obs(h.row(i), rng)?;
            v.row_mut(i).assign(&obs);
        }
        Ok(Data::new(s_seq, h, v))
    }

    /// Sample one observation row from a latent state: a multinomial with
    /// [`MULTINOMIAL_TRIALS`] draws over the categorical block, then one
    /// Poisson count per rate in the Poisson block.
    ///
    /// # Errors
    /// Rejects states of the wrong width or out of domain (negative
    /// weights, all-zero weights, non-positive rates).
    pub fn rand_obs<R: Rng + ?Sized>(
        &self, state: ArrayView1<f64>, rng: &mut R,
    ) -> BCPMResult<Array1<f64>> {
        validate_latent_state(state, self.m, self.n)?;
        let mut out = Array1::zeros(self.width());
        if self.m > 0 {
            let weights: Vec<f64> = state.slice(s![..self.m]).to_vec();
            let categorical = WeightedIndex::new(&weights)?;
            for _ in 0..MULTINOMIAL_TRIALS {
                out[categorical.sample(rng)] += 1.0;
            }
        }
        for i in 0..self.n {
            out[self.m + i] = Poisson::new(state[self.m + i])?.sample(rng);
        }
        Ok(out)
    }

    /// Flatten the model parameters to `[p1, m, n, alpha…, a…, b…]`.
    ///
    /// The capacity is configuration, not a learned parameter, and is not
    /// serialized.
    pub fn to_flat(&self) -> Array1<f64> {
        let mut out = Vec::with_capacity(3 + self.m + 2 * self.n);
        out.push(self.change_prob.p1());
        out.push(self.m as f64);
        out.push(self.n as f64);
        out.extend(self.prior.alpha.iter());
        out.extend(self.prior.a.iter());
        out.extend(self.prior.b.iter());
        Array1::from_vec(out)
    }

    /// Rebuild a model from a flat vector produced by [`to_flat`].
    ///
    /// # Errors
    /// Rejects vectors whose length disagrees with the encoded `(m, n)`,
    /// non-integral dimension entries, and any parameter the normal
    /// constructor would reject.
    ///
    /// [`to_flat`]: ChangePointModel::to_flat
    pub fn from_flat(flat: ArrayView1<f64>) -> BCPMResult<Self> {
        if flat.len() < 3 {
            return Err(BCPMError::FlatLengthMismatch { expected: 3, actual: flat.len() });
        }
        let m = dim_entry(flat[1])?;
        let n = dim_entry(flat[2])?;
        let expected = 3 + m + 2 * n;
        if flat.len() != expected {
            return Err(BCPMError::FlatLengthMismatch { expected, actual: flat.len() });
        }
        let alpha = flat.slice(s![3..3 + m]).to_owned();
        let a = flat.slice(s![3 + m..3 + m + n]).to_owned();
        let b = flat.slice(s![3 + m + n..]).to_owned();
        Self::new(flat[0], alpha, a, b)
    }

    /// Write the flat parameter vector to `path` in the text array format.
    pub fn save(&self, path: &Path) -> Result<(), PersistError> {
        write_vector(path, self.to_flat().view())
    }

    /// Load a model saved by [`save`]. The capacity comes back as
    /// [`DEFAULT_MAX_K`]; re-apply [`with_max_k`] if needed.
    ///
    /// [`save`]: ChangePointModel::save
    /// [`with_max_k`]: ChangePointModel::with_max_k
    pub fn load(path: &Path) -> Result<Self, PersistError> {
        let flat = read_vector(path)?;
        Ok(Self::from_flat(flat.view())?)
    }
}

fn dim_entry(value: f64) -> BCPMResult<usize> {
    if !value.is_finite() || value < 0.0 || value.fract().abs() > 1e-9 {
        return Err(BCPMError::InvalidDimensionEntry { value });
    }
    Ok(value as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, s};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Construction and configuration (validation wiring, capacity,
    //   change-probability swapping).
    // - The single-step recursion pieces (predict ordering, update
    //   absorption, forward seeding, backward windows).
    // - Data generation shapes/domains and the flat/persistence round
    //   trip.
    //
    // They intentionally DO NOT cover:
    // - Multi-step numerical behavior of the three readouts on realistic
    //   sequences (integration tests).
    // -------------------------------------------------------------------------

    fn poisson_model(p1: f64) -> ChangePointModel {
        ChangePointModel::new(p1, array![], array![10.0], array![1.0])
            .expect("valid single-rate model")
    }

    #[test]
    // Purpose
    // -------
    // Verify construction rejects bad change probabilities and bad priors
    // through the same validators the rest of the API uses.
    //
    // Given
    // -----
    // - p1 = 1.0 with a valid prior; p1 = 0.1 with an empty prior.
    //
    // Expect
    // ------
    // - InvalidChangeProb and EmptyPrior respectively; the valid
    //   combination constructs with m = 2, n = 1, width 3.
    fn construction_validates_inputs() {
        let err = ChangePointModel::new(1.0, array![1.0], array![], array![]);
        assert!(matches!(err, Err(BCPMError::InvalidChangeProb { .. })));

        let err = ChangePointModel::new(0.1, array![], array![], array![]);
        assert!(matches!(err, Err(BCPMError::EmptyPrior)));

        let model = ChangePointModel::new(0.1, array![1.0, 1.0], array![10.0], array![1.0])
            .expect("valid mixed model");
        assert_eq!((model.m(), model.n(), model.width()), (2, 1, 3));
        assert_eq!(model.max_k(), DEFAULT_MAX_K);
    }

    #[test]
    // Purpose
    // -------
    // Verify predict puts the change hypothesis first (slot 0) with
    // weight log(p1) + log-likelihood, and the no-change copies after it
    // with log(1 − p1) offsets.
    //
    // Given
    // -----
    // - A single-rate model with p1 = 0.1 and a one-component posterior
    //   with log-weight −2.0.
    //
    // Expect
    // ------
    // - Two components: slot 0 has the prior's parameters and log-weight
    //   ln(0.1) − 2.0; slot 1 has the posterior's parameters and
    //   log-weight −2.0 + ln(0.9).
    fn predict_orders_change_hypothesis_first() {
        let model = poisson_model(0.1);
        let mut posterior = Message::new(model.max_k()).expect("valid capacity");
        posterior.add_potential(Potential::new(array![], array![25.0], array![0.5], -2.0));

        let predicted = model.predict(&posterior);
        assert_eq!(predicted.len(), 2);

        let change = &predicted.potentials()[0];
        assert_eq!(change.a, model.prior().a);
        assert!((change.log_c - (0.1_f64.ln() - 2.0)).abs() < 1e-12);

        let kept = &predicted.potentials()[1];
        assert_eq!(kept.a, array![25.0]);
        assert!((kept.log_c - (-2.0 + 0.9_f64.ln())).abs() < 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Check the forward sweep's step-0 seeding and per-step message
    // growth: predict at step i has min(i + 2, max_k) components.
    //
    // Given
    // -----
    // - A single-rate model, p1 = 0.2, four constant observations.
    //
    // Expect
    // ------
    // - Both returned sequences have length 4.
    // - Predict/posterior component counts are 2, 3, 4, 5.
    // - The step-0 predict message holds two prior copies weighted
    //   ln(0.2) and ln(0.8), change first.
    fn forward_seeds_and_grows_messages() {
        let model = poisson_model(0.2);
        let obs = Array2::from_elem((4, 1), 5.0);
        let (predictions, posteriors) =
            model.forward(obs.view()).expect("valid observation matrix");
        assert_eq!(predictions.len(), 4);
        assert_eq!(posteriors.len(), 4);
        for (i, (pr, po)) in predictions.iter().zip(posteriors.iter()).enumerate() {
            assert_eq!(pr.len(), i + 2);
            assert_eq!(po.len(), i + 2);
        }
        let seed = &predictions[0];
        assert!((seed.potentials()[0].log_c - 0.2_f64.ln()).abs() < 1e-12);
        assert!((seed.potentials()[1].log_c - 0.8_f64.ln()).abs() < 1e-12);
        assert_eq!(seed.potentials()[0].a, model.prior().a);
    }

    #[test]
    // Purpose
    // -------
    // Verify backward window validation and the window's message shapes:
    // the last step of a window holds only the change factor, earlier
    // steps add one continuation per following component.
    //
    // Given
    // -----
    // - A single-rate model and five observations.
    //
    // Expect
    // ------
    // - backward(obs, 4, 5) yields five messages with component counts
    //   5, 4, 3, 2, 1 in time order.
    // - Length 0, start beyond the sequence, and windows reaching before
    //   step 0 all return InvalidWindow.
    fn backward_windows_are_validated_and_shaped() {
        let model = poisson_model(0.1);
        let obs = Array2::from_elem((5, 1), 3.0);

        let beta = model.backward(obs.view(), 4, 5).expect("full window fits");
        let lens: Vec<usize> = beta.iter().map(|msg| msg.len()).collect();
        assert_eq!(lens, vec![5, 4, 3, 2, 1]);

        for (start, length) in [(4usize, 0usize), (5, 1), (2, 4)] {
            assert!(matches!(
                model.backward(obs.view(), start, length),
                Err(BCPMError::InvalidWindow { .. })
            ));
        }
    }

    #[test]
    // Purpose
    // -------
    // On a single observation the three readouts coincide: there is no
    // future evidence to smooth with.
    //
    // Given
    // -----
    // - A single-rate model, p1 = 0.1, obs = [[7.0]].
    //
    // Expect
    // ------
    // - filter, smooth, and online_smooth(lag = 1) agree on cpp, mean,
    //   and log-likelihood within 1e-10.
    fn readouts_coincide_on_single_step() {
        let model = poisson_model(0.1);
        let obs = array![[7.0]];
        let f = model.filter(obs.view()).expect("filter");
        let s = model.smooth(obs.view()).expect("smooth");
        let o = model.online_smooth(obs.view(), 1).expect("online smooth");
        for est in [&s, &o] {
            assert!((est.cpp[0] - f.cpp[0]).abs() < 1e-10);
            assert!((est.mean[(0, 0)] - f.mean[(0, 0)]).abs() < 1e-10);
            assert!((est.log_likelihood - f.log_likelihood).abs() < 1e-10);
        }
    }

    #[test]
    // Purpose
    // -------
    // Verify set_change_prob swaps the whole validated value and keeps
    // the log forms consistent.
    //
    // Given
    // -----
    // - A model at p1 = 0.1 updated to p1 = 0.0, then a rejected update
    //   to p1 = 1.0.
    //
    // Expect
    // ------
    // - After the swap p1 = 0, log_p1 = −inf, log_p0 = 0.
    // - The rejected update leaves the probability at 0.
    fn set_change_prob_swaps_value() {
        let mut model = poisson_model(0.1);
        model.set_change_prob(0.0).expect("zero is a valid probability");
        assert_eq!(model.change_prob().p1(), 0.0);
        assert_eq!(model.change_prob().log_p1(), f64::NEG_INFINITY);
        assert_eq!(model.change_prob().log_p0(), 0.0);

        assert!(model.set_change_prob(1.0).is_err());
        assert_eq!(model.change_prob().p1(), 0.0);
    }

    #[test]
    // Purpose
    // -------
    // Check generated data shapes and domains: binary indicators,
    // positive rates, count observations summing correctly on the
    // categorical block.
    //
    // Given
    // -----
    // - A mixed model (m = 3, n = 2), p1 = 0.3, t = 50, seeded rng.
    //
    // Expect
    // ------
    // - s has length 50 with values in {0, 1}; h and v are 50 × 5.
    // - Every categorical row of v sums to MULTINOMIAL_TRIALS.
    // - All observation entries are nonnegative; all Poisson-block states
    //   are positive.
    fn generated_data_respects_domains() {
        let model = ChangePointModel::default_model(0.3, 3, 2).expect("valid shape");
        let mut rng = StdRng::seed_from_u64(11);
        let data = model.generate_data(50, &mut rng).expect("generation succeeds");

        assert_eq!(data.s.len(), 50);
        assert!(data.s.iter().all(|&v| v <= 1));
        assert_eq!(data.h.dim(), (50, 5));
        assert_eq!(data.v.dim(), (50, 5));
        for i in 0..50 {
            let cat_sum: f64 = data.v.row(i).iter().take(3).sum();
            assert!((cat_sum - MULTINOMIAL_TRIALS as f64).abs() < 1e-12);
            assert!(data.v.row(i).iter().all(|&x| x >= 0.0));
            assert!(data.h.row(i).iter().skip(3).all(|&x| x > 0.0));
        }
    }

    #[test]
    // Purpose
    // -------
    // Round-trip the flat encoding and reject malformed flats.
    //
    // Given
    // -----
    // - A mixed model (m = 2, n = 1), p1 = 0.05.
    //
    // Expect
    // ------
    // - from_flat(to_flat(model)) reproduces p1, m, n, and the prior.
    // - A truncated flat returns FlatLengthMismatch; a non-integral
    //   dimension entry returns InvalidDimensionEntry.
    fn flat_encoding_round_trips() {
        let model = ChangePointModel::new(0.05, array![2.0, 3.0], array![4.0], array![0.5])
            .expect("valid model");
        let flat = model.to_flat();
        assert_eq!(flat.len(), 3 + 2 + 2);
        assert_eq!(flat[0], 0.05);
        assert_eq!(flat[1], 2.0);
        assert_eq!(flat[2], 1.0);

        let restored = ChangePointModel::from_flat(flat.view()).expect("valid flat");
        assert_eq!(restored.change_prob().p1(), 0.05);
        assert_eq!(restored.prior(), model.prior());

        let truncated = flat.slice(s![..5]);
        assert!(matches!(
            ChangePointModel::from_flat(truncated),
            Err(BCPMError::FlatLengthMismatch { .. })
        ));

        let mut bad = flat.clone();
        bad[1] = 2.5;
        assert!(matches!(
            ChangePointModel::from_flat(bad.view()),
            Err(BCPMError::InvalidDimensionEntry { .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // Round-trip a model through the text persistence layer.
    //
    // Given
    // -----
    // - A mixed model saved to a temp file and loaded back.
    //
    // Expect
    // ------
    // - The loaded model matches on p1 and prior parameters (at 8-digit
    //   file precision).
    fn save_and_load_round_trip() {
        let model = ChangePointModel::new(0.125, array![1.5, 2.5], array![10.0], array![1.0])
            .expect("valid model");
        let mut path = std::env::temp_dir();
        path.push(format!("bcpm_model_{}.txt", std::process::id()));
        model.save(&path).expect("save to temp dir");
        let loaded = ChangePointModel::load(&path).expect("load saved model");
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.change_prob().p1(), model.change_prob().p1());
        assert_eq!(loaded.prior(), model.prior());
        assert_eq!(loaded.max_k(), DEFAULT_MAX_K);
    }
}
