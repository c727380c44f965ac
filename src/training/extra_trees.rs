//! Extra Trees (Extremely Randomized Trees)
//!
//! Unlike Random Forest, which searches the best threshold for each candidate
//! feature, Extra Trees draws one threshold per candidate feature uniformly
//! between the node's min and max. Lower variance, faster to train.

use super::decision_tree::{MaxFeatures, Splitter};
use super::models::{check_width, Classifier};
use super::random_forest::{forest_importances, forest_proba, grow_forest, ForestParams};
use super::decision_tree::DecisionTree;
use crate::error::{EnsembleError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Extra Trees classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraTrees {
    trees: Vec<DecisionTree>,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    /// Off by default; each tree then sees the full training set
    pub bootstrap: bool,
    pub random_state: u64,
    n_features: usize,
}

impl Default for ExtraTrees {
    fn default() -> Self {
        Self::new(100)
    }
}

impl ExtraTrees {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: false,
            random_state: 42,
            n_features: 0,
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for ExtraTrees {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let params = ForestParams {
            n_estimators: self.n_estimators,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features,
            splitter: Splitter::Random,
            bootstrap: self.bootstrap,
            random_state: self.random_state,
        };
        self.trees = grow_forest(&params, x, y)?;
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(EnsembleError::ModelNotFitted);
        }
        check_width(x, self.n_features)?;
        forest_proba(&self.trees, x)
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        forest_importances(&self.trees, self.n_features)
    }
}
