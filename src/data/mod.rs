//! Reference dataset access
//!
//! - [`provider`] - remote WDBC retrieval with a synthetic fallback
//! - [`synthetic`] - seeded generator shaped like the reference dataset
//! - [`statistics`] - class balance, per-feature summaries, correlations

pub mod provider;
pub mod statistics;
pub mod synthetic;

pub use provider::{DatasetProvider, WDBC_URL};
pub use statistics::{DatasetStatistics, FeatureSummary};
pub use synthetic::SyntheticGenerator;

use crate::error::{EnsembleError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label value for benign samples
pub const BENIGN: f64 = 0.0;
/// Label value for malignant samples
pub const MALIGNANT: f64 = 1.0;

/// Where a training set came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Remote,
    Synthetic,
}

/// Feature matrix and binary labels sharing one column ordering
#[derive(Debug, Clone)]
pub struct TrainingSet {
    pub feature_names: Vec<String>,
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    pub source: DataSource,
}

impl TrainingSet {
    pub fn new(
        feature_names: Vec<String>,
        x: Array2<f64>,
        y: Array1<f64>,
        source: DataSource,
    ) -> Result<Self> {
        if x.ncols() != feature_names.len() {
            return Err(EnsembleError::ShapeError {
                expected: format!("{} columns", feature_names.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        if x.nrows() != y.len() {
            return Err(EnsembleError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        Ok(Self { feature_names, x, y, source })
    }

    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    /// (benign, malignant) counts
    pub fn class_counts(&self) -> (usize, usize) {
        let malignant = self.y.iter().filter(|&&v| v == MALIGNANT).count();
        (self.y.len() - malignant, malignant)
    }

    /// Rows at the given positions, in that order
    pub fn select(&self, indices: &[usize]) -> TrainingSet {
        TrainingSet {
            feature_names: self.feature_names.clone(),
            x: self.x.select(Axis(0), indices),
            y: self.y.select(Axis(0), indices),
            source: self.source,
        }
    }

    /// Shuffled train/test split that keeps each class's share in both halves
    pub fn stratified_split(&self, test_size: f64, seed: u64) -> Result<(TrainingSet, TrainingSet)> {
        if !(0.0..1.0).contains(&test_size) || test_size == 0.0 {
            return Err(EnsembleError::InvalidParameter {
                name: "test_size".to_string(),
                value: test_size.to_string(),
                reason: "must be in (0, 1)".to_string(),
            });
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (i, &label) in self.y.iter().enumerate() {
            class_indices.entry(label as i64).or_default().push(i);
        }

        let mut train_idx = Vec::new();
        let mut test_idx = Vec::new();
        for indices in class_indices.values_mut() {
            indices.shuffle(&mut rng);
            let n_test = ((indices.len() as f64) * test_size).round().max(1.0) as usize;
            let n_test = n_test.min(indices.len().saturating_sub(1));
            test_idx.extend_from_slice(&indices[..n_test]);
            train_idx.extend_from_slice(&indices[n_test..]);
        }

        if train_idx.is_empty() || test_idx.is_empty() {
            return Err(EnsembleError::DataError(
                "Stratified split resulted in empty train or test set".to_string(),
            ));
        }

        train_idx.shuffle(&mut rng);
        test_idx.shuffle(&mut rng);
        Ok((self.select(&train_idx), self.select(&test_idx)))
    }
}
