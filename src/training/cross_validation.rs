//! Cross-validation splitters and scoring

use super::models::{accuracy, Classifier};
use crate::error::{EnsembleError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cross-validation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CVStrategy {
    /// K-Fold cross-validation
    KFold { n_splits: usize, shuffle: bool },
    /// Stratified K-Fold (maintains class distribution)
    StratifiedKFold { n_splits: usize, shuffle: bool },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::StratifiedKFold { n_splits: 5, shuffle: true }
    }
}

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: u64,
}

impl Default for CrossValidator {
    fn default() -> Self {
        Self::new(CVStrategy::default())
    }
}

impl CrossValidator {
    /// Create a new cross-validator
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: 42,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn n_splits(&self) -> usize {
        match self.strategy {
            CVStrategy::KFold { n_splits, .. } | CVStrategy::StratifiedKFold { n_splits, .. } => n_splits,
        }
    }

    /// Generate train/test splits
    pub fn split(&self, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        let n_samples = y.len();
        let n_splits = self.n_splits();
        if n_splits < 2 {
            return Err(EnsembleError::ConfigError("n_splits must be at least 2".to_string()));
        }
        if n_samples < n_splits {
            return Err(EnsembleError::DataError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }
        match self.strategy {
            CVStrategy::KFold { shuffle, .. } => Ok(self.k_fold_split(n_samples, n_splits, shuffle)),
            CVStrategy::StratifiedKFold { shuffle, .. } => Ok(self.stratified_k_fold_split(y, n_splits, shuffle)),
        }
    }

    fn k_fold_split(&self, n_samples: usize, n_splits: usize, shuffle: bool) -> Vec<CVSplit> {
        let mut indices: Vec<usize> = (0..n_samples).collect();
        if shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
            indices.shuffle(&mut rng);
        }

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;

        let mut splits = Vec::with_capacity(n_splits);
        let mut current = 0;
        for fold_idx in 0..n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            let test_indices = indices[current..current + fold_size].to_vec();
            let train_indices = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();
            splits.push(CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            });
            current += fold_size;
        }
        splits
    }

    fn stratified_k_fold_split(&self, y: &Array1<f64>, n_splits: usize, shuffle: bool) -> Vec<CVSplit> {
        // ordered so fold assignment does not depend on hash iteration
        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &val) in y.iter().enumerate() {
            class_indices.entry(val.round() as i64).or_default().push(idx);
        }

        if shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
            for indices in class_indices.values_mut() {
                indices.shuffle(&mut rng);
            }
        }

        // continue the round-robin across classes so fold sizes stay balanced
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        let mut slot = 0;
        for indices in class_indices.values() {
            for &idx in indices {
                folds[slot % n_splits].push(idx);
                slot += 1;
            }
        }

        (0..n_splits)
            .map(|fold_idx| CVSplit {
                test_indices: folds[fold_idx].clone(),
                train_indices: folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect(),
                fold_idx,
            })
            .collect()
    }

    /// Fit a fresh copy of `model` on each training fold and score accuracy
    /// on the held-out fold
    pub fn cross_val_score<M>(&self, model: &M, x: &Array2<f64>, y: &Array1<f64>) -> Result<CVResults>
    where
        M: Classifier + Clone,
    {
        let splits = self.split(y)?;
        Self::score_splits(&splits, model, x, y)
    }

    /// Score `model` on precomputed folds so several models can share them
    pub fn score_splits<M>(splits: &[CVSplit], model: &M, x: &Array2<f64>, y: &Array1<f64>) -> Result<CVResults>
    where
        M: Classifier + Clone,
    {
        let mut scores = Vec::with_capacity(splits.len());
        for split in splits {
            let x_train = x.select(Axis(0), &split.train_indices);
            let y_train = y.select(Axis(0), &split.train_indices);
            let x_test = x.select(Axis(0), &split.test_indices);
            let y_test = y.select(Axis(0), &split.test_indices);

            let mut fold_model = model.clone();
            fold_model.fit(&x_train, &y_train)?;
            let preds = fold_model.predict(&x_test)?;
            scores.push(accuracy(&y_test, &preds));
        }
        Ok(CVResults::from_scores(scores))
    }
}

/// Cross-validation results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    /// Mean score across folds
    pub mean_score: f64,
    /// Standard deviation of scores
    pub std_score: f64,
    /// Number of folds
    pub n_folds: usize,
}

impl CVResults {
    /// Create CV results from fold scores
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        if n_folds == 0 {
            return Self {
                scores,
                mean_score: 0.0,
                std_score: 0.0,
                n_folds,
            };
        }
        let mean_score = scores.iter().sum::<f64>() / n_folds as f64;
        let variance = scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n_folds as f64;

        Self {
            scores,
            mean_score,
            std_score: variance.sqrt(),
            n_folds,
        }
    }
}
