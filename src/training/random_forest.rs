//! Random Forest classifier
//!
//! Trees are grown in parallel on bootstrap samples, each with its own
//! seeded RNG so the forest is reproducible regardless of thread count.

use super::decision_tree::{Criterion, DecisionTree, MaxFeatures, Splitter};
use super::models::{binary_proba, check_binary_xy, check_width, Classifier};
use crate::error::{EnsembleError, Result};
use ndarray::{Array1, Array2};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Settings shared by every tree of a forest
#[derive(Debug, Clone, Copy)]
pub(crate) struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub splitter: Splitter,
    pub bootstrap: bool,
    pub random_state: u64,
}

/// Grow `n_estimators` classification trees in parallel
pub(crate) fn grow_forest(params: &ForestParams, x: &Array2<f64>, y: &Array1<f64>) -> Result<Vec<DecisionTree>> {
    if params.n_estimators == 0 {
        return Err(EnsembleError::InvalidParameter {
            name: "n_estimators".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        });
    }
    check_binary_xy(x, y)?;
    let n_samples = x.nrows();

    (0..params.n_estimators)
        .into_par_iter()
        .map(|tree_idx| {
            let seed = params.random_state.wrapping_add(tree_idx as u64);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);

            let rows: Vec<usize> = if params.bootstrap {
                (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
            } else {
                (0..n_samples).collect()
            };

            let mut tree = DecisionTree::new_classifier()
                .with_criterion(Criterion::Gini)
                .with_max_depth(params.max_depth)
                .with_min_samples_split(params.min_samples_split)
                .with_min_samples_leaf(params.min_samples_leaf)
                .with_max_features(params.max_features)
                .with_splitter(params.splitter)
                .with_random_state(seed);
            tree.fit_rows(x, y, &rows, None, &mut rng)?;
            Ok(tree)
        })
        .collect()
}

/// Average of leaf class shares across trees
pub(crate) fn forest_proba(trees: &[DecisionTree], x: &Array2<f64>) -> Result<Array2<f64>> {
    if trees.is_empty() {
        return Err(EnsembleError::ModelNotFitted);
    }
    let n = x.nrows();
    let sum = trees
        .par_iter()
        .map(|tree| tree.predict(x))
        .try_reduce(|| Array1::zeros(n), |a, b| Ok(a + b))?;
    let n_trees = trees.len() as f64;
    Ok(binary_proba(sum.iter().map(|s| s / n_trees)))
}

/// Mean of per-tree normalized importances
pub(crate) fn forest_importances(trees: &[DecisionTree], n_features: usize) -> Option<Array1<f64>> {
    if trees.is_empty() {
        return None;
    }
    let mut total = Array1::zeros(n_features);
    for imp in trees.iter().filter_map(|t| t.feature_importances()) {
        total = total + imp;
    }
    let sum = total.sum();
    if sum > 0.0 {
        total.mapv_inplace(|v| v / sum);
    }
    Some(total)
}

/// Random Forest model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    /// Individual trees
    trees: Vec<DecisionTree>,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split (sqrt by default)
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub random_state: u64,
    n_features: usize,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
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

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn params(&self) -> ForestParams {
        ForestParams {
            n_estimators: self.n_estimators,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features,
            splitter: Splitter::Best,
            bootstrap: self.bootstrap,
            random_state: self.random_state,
        }
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.trees = grow_forest(&self.params(), x, y)?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [1.0, 2.0, 0.3], [1.5, 1.8, 0.1], [2.0, 2.2, 0.5], [1.2, 1.1, 0.9],
            [6.0, 7.0, 0.2], [6.5, 6.8, 0.8], [7.0, 6.2, 0.4], [6.2, 7.4, 0.6],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_classifier() {
        let (x, y) = blobs();
        let mut rf = RandomForest::new(25).with_max_depth(Some(5));
        rf.fit(&x, &y).unwrap();
        assert_eq!(rf.n_trees(), 25);
        let preds = rf.predict(&x).unwrap();
        assert_eq!(preds.to_vec(), y.to_vec());
    }

    #[test]
    fn test_predict_proba_rows_sum_to_one() {
        let (x, y) = blobs();
        let mut rf = RandomForest::new(15);
        rf.fit(&x, &y).unwrap();
        let proba = rf.predict_proba(&x).unwrap();
        assert_eq!(proba.dim(), (8, 2));
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn test_reproducible_with_seed() {
        let (x, y) = blobs();
        let mut a = RandomForest::new(10).with_random_state(7);
        let mut b = RandomForest::new(10).with_random_state(7);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        let query = array![[3.5, 4.0, 0.5]];
        assert_eq!(a.predict_proba(&query).unwrap(), b.predict_proba(&query).unwrap());
    }

    #[test]
    fn test_feature_importances() {
        let (x, y) = blobs();
        let mut rf = RandomForest::new(30).with_max_features(MaxFeatures::All);
        rf.fit(&x, &y).unwrap();
        let imp = rf.feature_importances().unwrap();
        assert!((imp.sum() - 1.0).abs() < 1e-10);
        // the noise column never beats the informative ones
        assert!(imp[2] < imp[0] + imp[1]);
    }

    #[test]
    fn test_zero_estimators_rejected() {
        let (x, y) = blobs();
        let mut rf = RandomForest::new(0);
        assert!(matches!(rf.fit(&x, &y), Err(EnsembleError::InvalidParameter { .. })));
        assert!(!rf.is_fitted());
    }
}
