//! Data and result containers for change point experiments.
//!
//! [`Data`] bundles a generated (or externally supplied) experiment: a
//! binary changepoint indicator sequence, the latent-state sequence, and
//! the observation sequence, all time-aligned with equal length T.
//! [`Estimate`] bundles what one inference call produces: a per-step
//! changepoint posterior probability, a per-step posterior mean vector,
//! the overall log-likelihood, and — once scored against ground truth —
//! an F-score.
//!
//! Scoring is threshold-based: a predicted changepoint is a time step
//! whose posterior probability exceeds a threshold (default 0.99), and it
//! matches a true changepoint `x` when `-1 ≤ x − y < window` (default
//! window 10).
use ndarray::{Array1, Array2, ArrayView1};
use std::path::Path;

use crate::changepoint::errors::PersistError;
use crate::changepoint::persistence::{
    read_matrix, read_vector, write_matrix, write_vector,
};

/// Default posterior-probability threshold for calling a changepoint.
pub const DEFAULT_THRESHOLD: f64 = 0.99;

/// Default symmetric tolerance window for matching predicted against true
/// changepoints.
pub const DEFAULT_WINDOW: usize = 10;

/// One experiment's worth of time-aligned sequences.
#[derive(Debug, Clone, PartialEq)]
pub struct Data {
    /// Binary changepoint indicators, length T.
    pub s: Array1<u8>,
    /// Latent states, shape T × (m + n).
    pub h: Array2<f64>,
    /// Observations, shape T × (m + n).
    pub v: Array2<f64>,
}

impl Data {
    /// Bundle pre-built sequences. Lengths are the caller's contract; the
    /// model validates the observation matrix at inference time.
    pub fn new(s: Array1<u8>, h: Array2<f64>, v: Array2<f64>) -> Self {
        Data { s, h, v }
    }

    /// Write the nonempty sequences under `dir` as `cps.txt`,
    /// `states.txt`, and `obs.txt` in the flat text array format.
    pub fn save(&self, dir: &Path) -> Result<(), PersistError> {
        std::fs::create_dir_all(dir)?;
        if !self.s.is_empty() {
            let cps = self.s.mapv(|v| v as f64);
            write_vector(&dir.join("cps.txt"), cps.view())?;
        }
        if self.h.nrows() > 0 {
            write_matrix(&dir.join("states.txt"), self.h.view())?;
        }
        if self.v.nrows() > 0 {
            write_matrix(&dir.join("obs.txt"), self.v.view())?;
        }
        Ok(())
    }

    /// Read whichever of `cps.txt`, `states.txt`, `obs.txt` exist under
    /// `dir`; missing files yield empty sequences.
    pub fn load(dir: &Path) -> Result<Self, PersistError> {
        let cps_path = dir.join("cps.txt");
        let s = if cps_path.is_file() {
            read_vector(&cps_path)?.mapv(|v| v as u8)
        } else {
            Array1::zeros(0)
        };
        let states_path = dir.join("states.txt");
        let h = if states_path.is_file() {
            read_matrix(&states_path)?
        } else {
            Array2::zeros((0, 0))
        };
        let obs_path = dir.join("obs.txt");
        let v = if obs_path.is_file() { read_matrix(&obs_path)? } else { Array2::zeros((0, 0)) };
        Ok(Data { s, h, v })
    }
}

/// Inference output: per-step changepoint probabilities and posterior
/// means, the sequence log-likelihood, and an optional evaluation score.
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    /// Changepoint posterior probability per time step, values in [0, 1].
    pub cpp: Array1<f64>,
    /// Posterior mean of the latent state per time step, T × (m + n).
    pub mean: Array2<f64>,
    /// Log-likelihood of the full observation sequence.
    pub log_likelihood: f64,
    /// F-score against ground truth, set by [`Estimate::evaluate`].
    pub score: Option<f64>,
}

impl Estimate {
    /// Bundle raw inference outputs; `score` starts unset.
    pub fn new(cpp: Array1<f64>, mean: Array2<f64>, log_likelihood: f64) -> Self {
        Estimate { cpp, mean, log_likelihood, score: None }
    }

    /// Score the changepoint probabilities against a ground-truth
    /// indicator sequence, storing and returning the F-score.
    ///
    /// Predicted changepoints are steps with `cpp > threshold`. A true
    /// point `x` and a predicted point `y` match when
    /// `-1 ≤ x − y < window`; each match marks both points. Then
    /// `TP` = matched true points, `FP` = unmatched predicted points,
    /// `FN` = true points − TP, and the score is `2PR/(P + R)`, or 0
    /// when no true point was matched.
    pub fn evaluate(&mut self, cps: ArrayView1<u8>, threshold: f64, window: usize) -> f64 {
        let truths: Vec<isize> = cps
            .iter()
            .enumerate()
            .filter_map(|(i, &v)| (v == 1).then_some(i as isize))
            .collect();
        let preds: Vec<isize> = self
            .cpp
            .iter()
            .enumerate()
            .filter_map(|(i, &p)| (p > threshold).then_some(i as isize))
            .collect();

        let mut true_matched = vec![false; truths.len()];
        let mut pred_matched = vec![false; preds.len()];
        for (i, &x) in truths.iter().enumerate() {
            for (j, &y) in preds.iter().enumerate() {
                let d = x - y;
                if d >= -1 && d < window as isize {
                    true_matched[i] = true;
                    pred_matched[j] = true;
                }
            }
        }

        let tp = true_matched.iter().filter(|&&m| m).count() as f64;
        let fp = pred_matched.iter().filter(|&&m| !m).count() as f64;
        let fn_ = truths.len() as f64 - tp;

        let score = if tp > 0.0 {
            let precision = tp / (tp + fp);
            let recall = tp / (tp + fn_);
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        self.score = Some(score);
        score
    }

    /// Write `cpp.txt`, `mean.txt`, `ll.txt`, and (if evaluated)
    /// `score.txt` under `dir` in the flat text array format.
    pub fn save(&self, dir: &Path) -> Result<(), PersistError> {
        std::fs::create_dir_all(dir)?;
        write_vector(&dir.join("cpp.txt"), self.cpp.view())?;
        write_matrix(&dir.join("mean.txt"), self.mean.view())?;
        write_vector(&dir.join("ll.txt"), ndarray::arr1(&[self.log_likelihood]).view())?;
        if let Some(score) = self.score {
            write_vector(&dir.join("score.txt"), ndarray::arr1(&[score]).view())?;
        }
        Ok(())
    }
}
