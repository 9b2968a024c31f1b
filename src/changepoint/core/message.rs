//! Capacity-bounded mixtures of potentials with greedy eviction.
//!
//! A [`Message`] approximates a posterior or likelihood function as a
//! weighted mixture of at most `max_k` [`Potential`]s. Insertion beyond
//! capacity evicts the component with the globally smallest log-weight,
//! found through a min-heap of `(log_c, slot)` entries, so the forward and
//! backward recursions run in O(max_k) per step instead of growing
//! without bound. Evicting the lowest-weight component is a greedy
//! approximation: it discards the least probable explanation.
//!
//! ## Invariants & assumptions
//! - `len() ≤ max_k` after any insertion sequence.
//! - The component at slot 0 is never registered in the eviction heap and
//!   therefore survives for the message's lifetime once set. The
//!   recursions rely on this (slot 0 holds the change hypothesis); note
//!   it also means slot 0 can pin an arbitrarily low-weight component at
//!   capacity.
//! - Slot order beyond 0 is a storage index, not a rank.
//! - The mixture is never renormalized in place; normalization
//!   ([`Message::posterior_weights`]) is computed on demand.
//! - Messages are single-owner, single-writer: each recursion step builds
//!   its own message, reads its summaries, and moves on.
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ndarray::Array1;

use crate::changepoint::core::numerics::{log_sum_exp, softmax};
use crate::changepoint::core::potential::Potential;
use crate::changepoint::core::validation::validate_capacity;
use crate::changepoint::errors::BCPMResult;

/// Default mixture capacity.
pub const DEFAULT_MAX_K: usize = 100;

/// Eviction-heap entry: a component's log-weight and its storage slot.
///
/// Ordered by `log_c` first (via `total_cmp`, so every pair of floats is
/// comparable), then by slot as a tiebreak. The ordering carries no
/// probabilistic meaning beyond "current weight".
#[derive(Debug, Clone, Copy)]
struct HeapEntry {
    log_c: f64,
    slot: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.log_c.total_cmp(&other.log_c).then(self.slot.cmp(&other.slot))
    }
}

/// Bounded weighted mixture of [`Potential`]s.
///
/// Created empty per recursion step, populated via
/// [`Message::add_potential`], then consumed read-only to compute
/// summaries. Total evidence is the linear-domain sum of component
/// weights, exposed in log domain by [`Message::log_likelihood`].
#[derive(Debug, Clone)]
pub struct Message {
    potentials: Vec<Potential>,
    heap: BinaryHeap<std::cmp::Reverse<HeapEntry>>,
    max_k: usize,
}

impl Message {
    /// Create an empty message with capacity `max_k`.
    ///
    /// # Errors
    /// `max_k = 0` is a configuration error ([`ZeroCapacity`]).
    ///
    /// [`ZeroCapacity`]: crate::changepoint::errors::BCPMError::ZeroCapacity
    pub fn new(max_k: usize) -> BCPMResult<Self> {
        validate_capacity(max_k)?;
        Ok(Message { potentials: Vec::new(), heap: BinaryHeap::new(), max_k })
    }

    /// Create an empty message with the default capacity
    /// ([`DEFAULT_MAX_K`]).
    pub fn with_default_capacity() -> Self {
        Message { potentials: Vec::new(), heap: BinaryHeap::new(), max_k: DEFAULT_MAX_K }
    }

    /// Number of components currently stored.
    pub fn len(&self) -> usize {
        self.potentials.len()
    }

    /// Whether the message holds no components yet.
    pub fn is_empty(&self) -> bool {
        self.potentials.is_empty()
    }

    /// The configured capacity.
    pub fn max_k(&self) -> usize {
        self.max_k
    }

    /// Read-only view of the stored components.
    pub fn potentials(&self) -> &[Potential] {
        &self.potentials
    }

    /// Insert a potential under the bounded-capacity eviction policy.
    ///
    /// Below capacity the potential is appended as a new slot. At
    /// capacity, the minimum-`log_c` component registered in the heap is
    /// evicted and its slot overwritten. The new potential is then
    /// registered in the heap *unless* it landed in slot 0 — slot 0 is
    /// permanently protected (see the module docs).
    ///
    /// # Panics
    /// At capacity with an empty eviction heap, which can only happen for
    /// `max_k = 1` (every slot is the protected slot 0); that is a logic
    /// bug in the caller's configuration.
    pub fn add_potential(&mut self, p: Potential) {
        let log_c = p.log_c;
        let slot = if self.potentials.len() == self.max_k {
            let std::cmp::Reverse(entry) = self
                .heap
                .pop()
                .expect("eviction heap is empty at capacity: no evictable slot besides slot 0");
            self.potentials[entry.slot] = p;
            entry.slot
        } else {
            self.potentials.push(p);
            self.potentials.len() - 1
        };
        if slot > 0 {
            self.heap.push(std::cmp::Reverse(HeapEntry { log_c, slot }));
        }
    }

    /// Mixture cross product: one output component per ordered pair of
    /// input components, `|out| = |self|·|other|`.
    ///
    /// Deliberately **unbounded**: the output bypasses
    /// [`Message::add_potential`] and the eviction heap entirely. It is
    /// used once per time index to compose a
    /// forward predict message with a backward message at read time, and
    /// its result is consumed immediately; bounding it here would change
    /// the smoothing output at every coupled time step. Component order is
    /// `self`-major, which the smoothing readout relies on (the first
    /// `|other|` components pair `self`'s change hypothesis with every
    /// backward component).
    pub fn multiply(&self, other: &Message) -> Message {
        let mut out = Message {
            potentials: Vec::with_capacity(self.potentials.len() * other.potentials.len()),
            heap: BinaryHeap::new(),
            max_k: DEFAULT_MAX_K,
        };
        for p1 in &self.potentials {
            for p2 in &other.potentials {
                out.potentials.push(p1.multiply(p2));
            }
        }
        out
    }

    /// Component log-weights in slot order.
    pub fn log_weights(&self) -> Array1<f64> {
        Array1::from_iter(self.potentials.iter().map(|p| p.log_c))
    }

    /// Total evidence in log domain: a max-shifted log-sum-exp over the
    /// component log-weights. `-inf` for an empty message.
    pub fn log_likelihood(&self) -> f64 {
        log_sum_exp(self.log_weights().view())
    }

    /// Per-component posterior probability mass: softmax of the component
    /// log-weights. Sums to one for any nonempty message and is invariant
    /// under adding a constant to every log-weight.
    ///
    /// # Panics
    /// On an empty message (a summary of nothing is a logic bug).
    pub fn posterior_weights(&self) -> Array1<f64> {
        assert!(!self.is_empty(), "posterior weights requested from an empty message");
        softmax(self.log_weights().view())
    }

    /// Posterior probability that a change occurred within the hypotheses
    /// stored in the first `k` slots.
    ///
    /// By construction of the recursions the first `k` components of a
    /// message are the "change occurred in the last k steps" hypotheses,
    /// so this partial sum is exactly the marginal changepoint posterior.
    /// Non-decreasing in `k` and bounded in [0, 1]; `k` beyond the
    /// message length saturates at 1.
    pub fn change_point_probability(&self, k: usize) -> f64 {
        self.posterior_weights().iter().take(k).sum()
    }

    /// Posterior-weighted mixture mean of the latent state, one entry per
    /// feature.
    ///
    /// # Panics
    /// On an empty message.
    pub fn mean(&self) -> Array1<f64> {
        let weights = self.posterior_weights();
        let mut out = Array1::zeros(self.potentials[0].size());
        for (p, &w) in self.potentials.iter().zip(weights.iter()) {
            out += &(p.mean() * w);
        }
        out
    }

    /// Posterior-weighted mixture of the components' expected sufficient
    /// statistics, in the layout of
    /// [`Potential::sufficient_statistics`]. Feeds moment-based prior
    /// re-estimation via [`Potential::fit`].
    ///
    /// # Panics
    /// On an empty message.
    pub fn sufficient_statistics(&self) -> Array1<f64> {
        let weights = self.posterior_weights();
        let first = self.potentials[0].sufficient_statistics();
        let mut out = first * weights[0];
        for (p, &w) in self.potentials.iter().zip(weights.iter()).skip(1) {
            out += &(p.sufficient_statistics() * w);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Capacity bounding, eviction order, and the protected slot 0.
    // - Summary functions (posterior weights, cpp, mean, log-likelihood)
    //   and their scale invariance.
    // - The unbounded cross product and its component ordering.
    //
    // They intentionally DO NOT cover:
    // - The recursion semantics that decide *which* potentials get
    //   inserted (model and integration tests).
    // -------------------------------------------------------------------------

    fn poisson_potential(log_c: f64) -> Potential {
        Potential::new(array![], array![10.0], array![1.0], log_c)
    }

    #[test]
    // Purpose
    // -------
    // Confirm Message::new rejects a zero capacity.
    //
    // Given
    // -----
    // - max_k = 0.
    //
    // Expect
    // ------
    // - Err(ZeroCapacity).
    fn zero_capacity_is_rejected() {
        use crate::changepoint::errors::BCPMError;
        assert!(matches!(Message::new(0), Err(BCPMError::ZeroCapacity)));
    }

    #[test]
    // Purpose
    // -------
    // Verify the capacity invariant and that eviction always removes the
    // current minimum-weight component among slots 1.., never slot 0.
    //
    // Given
    // -----
    // - max_k = 3; insertions with log-weights 0.0 (slot 0), then -5.0,
    //   -1.0, and finally 10.0 and 20.0 once the message is full.
    //
    // Expect
    // ------
    // - len() stays at 3.
    // - After inserting 10.0, the -5.0 component is gone; after inserting
    //   20.0, the -1.0 component is gone.
    // - The slot-0 component (log_c = 0.0) survives throughout even
    //   though its weight is lower than the late arrivals.
    fn eviction_removes_minimum_but_protects_slot_zero() {
        let mut msg = Message::new(3).expect("capacity 3 is valid");
        for &w in &[0.0, -5.0, -1.0] {
            msg.add_potential(poisson_potential(w));
        }
        assert_eq!(msg.len(), 3);

        msg.add_potential(poisson_potential(10.0));
        assert_eq!(msg.len(), 3);
        let weights: Vec<f64> = msg.potentials().iter().map(|p| p.log_c).collect();
        assert!(weights.contains(&0.0));
        assert!(weights.contains(&10.0));
        assert!(!weights.contains(&-5.0));

        msg.add_potential(poisson_potential(20.0));
        let weights: Vec<f64> = msg.potentials().iter().map(|p| p.log_c).collect();
        assert!(weights.contains(&0.0), "slot 0 must survive: {weights:?}");
        assert!(weights.contains(&10.0));
        assert!(weights.contains(&20.0));
        assert!(!weights.contains(&-1.0));
        assert_eq!(msg.potentials()[0].log_c, 0.0);
    }

    #[test]
    // Purpose
    // -------
    // Check posterior weights normalize, cpp is monotone in k and bounded
    // in [0, 1], and cpp(len) reaches 1.
    //
    // Given
    // -----
    // - A message with log-weights [-0.5, 1.0, 0.0, -3.0].
    //
    // Expect
    // ------
    // - posterior_weights() sums to 1 within 1e-12.
    // - cpp(k) is non-decreasing over k = 0..=5 and cpp(4) ≈ 1, with
    //   cpp(5) saturating at the same value.
    fn posterior_weights_normalize_and_cpp_is_monotone() {
        let mut msg = Message::new(10).expect("valid capacity");
        for &w in &[-0.5, 1.0, 0.0, -3.0] {
            msg.add_potential(poisson_potential(w));
        }
        assert!((msg.posterior_weights().sum() - 1.0).abs() < 1e-12);

        let mut last = 0.0;
        for k in 0..=5 {
            let cpp = msg.change_point_probability(k);
            assert!((0.0..=1.0 + 1e-12).contains(&cpp));
            assert!(cpp + 1e-12 >= last, "cpp must be non-decreasing in k");
            last = cpp;
        }
        assert!((msg.change_point_probability(4) - 1.0).abs() < 1e-12);
        assert!((msg.change_point_probability(5) - 1.0).abs() < 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Verify scale invariance: adding a constant to every log-weight
    // leaves posterior weights, cpp, and mean unchanged while shifting
    // log-likelihood by exactly that constant.
    //
    // Given
    // -----
    // - Two copies of a three-component Poisson message, one with +123.45
    //   added to every log-weight.
    //
    // Expect
    // ------
    // - posterior_weights, cpp(1), cpp(2), and mean agree within 1e-12.
    // - log_likelihood differs by 123.45 within 1e-9.
    fn summaries_are_scale_invariant() {
        let shift = 123.45;
        let mut base = Message::new(10).expect("valid capacity");
        let mut shifted = Message::new(10).expect("valid capacity");
        for (i, &w) in [-2.0, 0.3, 1.7].iter().enumerate() {
            let mut p = Potential::new(array![], array![5.0 + i as f64], array![1.0], w);
            base.add_potential(p.clone());
            p.log_c += shift;
            shifted.add_potential(p);
        }

        let (pw_a, pw_b) = (base.posterior_weights(), shifted.posterior_weights());
        for (a, b) in pw_a.iter().zip(pw_b.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
        for k in 1..=2 {
            let d = (base.change_point_probability(k) - shifted.change_point_probability(k)).abs();
            assert!(d < 1e-12);
        }
        for (a, b) in base.mean().iter().zip(shifted.mean().iter()) {
            assert!((a - b).abs() < 1e-12);
        }
        assert!((shifted.log_likelihood() - base.log_likelihood() - shift).abs() < 1e-9);
    }

    #[test]
    // Purpose
    // -------
    // Confirm the cross product is unbounded (|m1|·|m2| components, even
    // past DEFAULT_MAX_K-relative capacities) and self-major ordered.
    //
    // Given
    // -----
    // - m1 with 3 components of log-weights 0, 1, 2 and capacity 3;
    //   m2 with 2 components of log-weights 10, 20 and capacity 2.
    //
    // Expect
    // ------
    // - The product has exactly 6 components.
    // - Component i*2 + j has log-weight (i + 10·(j+1)) plus the conjugate
    //   correction, so the ordering is m1-major: checked by comparing
    //   against explicitly computed pairwise products.
    fn cross_product_is_unbounded_and_ordered() {
        let mut m1 = Message::new(3).expect("valid capacity");
        for &w in &[0.0, 1.0, 2.0] {
            m1.add_potential(poisson_potential(w));
        }
        let mut m2 = Message::new(2).expect("valid capacity");
        for &w in &[10.0, 20.0] {
            m2.add_potential(poisson_potential(w));
        }

        let prod = m1.multiply(&m2);
        assert_eq!(prod.len(), 6);
        for (i, p1) in m1.potentials().iter().enumerate() {
            for (j, p2) in m2.potentials().iter().enumerate() {
                let expected = p1.multiply(p2);
                let got = &prod.potentials()[i * 2 + j];
                assert!((got.log_c - expected.log_c).abs() < 1e-12);
            }
        }
    }

    #[test]
    // Purpose
    // -------
    // Check log_likelihood matches a direct log-sum-exp of the component
    // weights and the mixture mean interpolates the component means.
    //
    // Given
    // -----
    // - Two Poisson components with equal log-weights and means 10 and 20.
    //
    // Expect
    // ------
    // - log_likelihood = ln(2) (both weights are 0.0).
    // - mean = 15 within 1e-12 (equal posterior mass).
    fn log_likelihood_and_mean_match_hand_computation() {
        let mut msg = Message::new(4).expect("valid capacity");
        msg.add_potential(Potential::new(array![], array![10.0], array![1.0], 0.0));
        msg.add_potential(Potential::new(array![], array![20.0], array![1.0], 0.0));
        assert!((msg.log_likelihood() - 2.0_f64.ln()).abs() < 1e-12);
        assert!((msg.mean()[0] - 15.0).abs() < 1e-12);
    }
}
