//! Gradient boosted decision trees for binary classification
//!
//! Each round fits a regression tree to the log-loss gradient `y - p` on a
//! row subsample, replaces each leaf with the Newton step
//! `Σ(y - p) / Σ p(1 - p)` over its rows, then shifts the log-odds of every
//! row by the shrunken tree output.

use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::decision_tree::DecisionTree;
use super::models::{binary_proba, check_binary_xy, check_width, sigmoid, Classifier};
use crate::error::{EnsembleError, Result};

/// Gradient Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Subsample ratio for each tree
    pub subsample: f64,
    /// Random seed
    pub random_state: u64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            random_state: 42,
        }
    }
}

impl GradientBoostingConfig {
    fn validate(&self) -> Result<()> {
        let invalid = |name: &str, value: String, reason: &str| EnsembleError::InvalidParameter {
            name: name.to_string(),
            value,
            reason: reason.to_string(),
        };
        if self.n_estimators == 0 {
            return Err(invalid("n_estimators", "0".into(), "must be positive"));
        }
        if !(self.learning_rate > 0.0) {
            return Err(invalid("learning_rate", self.learning_rate.to_string(), "must be positive"));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(invalid("subsample", self.subsample.to_string(), "must be in (0, 1]"));
        }
        Ok(())
    }
}

/// One Newton-Raphson step on the binomial deviance for a leaf's rows
fn newton_step(rows: &[usize], residuals: &Array1<f64>, probs: &Array1<f64>) -> f64 {
    let (num, den) = rows.iter().fold((0.0_f64, 0.0_f64), |(num, den), &i| {
        (num + residuals[i], den + probs[i] * (1.0 - probs[i]))
    });
    if den < 1e-150 {
        0.0
    } else {
        num / den
    }
}

/// Gradient Boosting Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    pub config: GradientBoostingConfig,
    trees: Vec<DecisionTree>,
    initial_log_odds: f64,
    n_features: usize,
    feature_importances: Vec<f64>,
}

impl Default for GradientBoostingClassifier {
    fn default() -> Self {
        Self::new(GradientBoostingConfig::default())
    }
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_log_odds: 0.0,
            n_features: 0,
            feature_importances: Vec::new(),
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Raw log-odds for every row
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(EnsembleError::ModelNotFitted);
        }
        check_width(x, self.n_features)?;
        let mut log_odds = Array1::from_elem(x.nrows(), self.initial_log_odds);
        for tree in &self.trees {
            let step = tree.predict(x)?;
            log_odds.scaled_add(self.config.learning_rate, &step);
        }
        Ok(log_odds)
    }

    fn subsample_indices(&self, n: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        if self.config.subsample >= 1.0 {
            return (0..n).collect();
        }
        let sample_size = (((n as f64) * self.config.subsample).ceil() as usize).max(1);
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(rng);
        indices.truncate(sample_size);
        indices.sort_unstable();
        indices
    }
}

impl Classifier for GradientBoostingClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.config.validate()?;
        check_binary_xy(x, y)?;
        let n_samples = x.nrows();
        let n_features = x.ncols();

        let p = y.mean().unwrap_or(0.5).clamp(1e-10, 1.0 - 1e-10);
        let initial_log_odds = (p / (1.0 - p)).ln();
        let mut log_odds = Array1::from_elem(n_samples, initial_log_odds);

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        let mut trees = Vec::with_capacity(self.config.n_estimators);
        let mut importances = vec![0.0; n_features];

        for _ in 0..self.config.n_estimators {
            let probs: Array1<f64> = log_odds.mapv(sigmoid);
            let residuals: Array1<f64> = y - &probs;

            let rows = self.subsample_indices(n_samples, &mut rng);
            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(Some(self.config.max_depth))
                .with_min_samples_split(self.config.min_samples_split)
                .with_min_samples_leaf(self.config.min_samples_leaf);
            tree.fit_rows(x, &residuals, &rows, None, &mut rng)?;
            tree.refit_leaves(x, &rows, &|leaf_rows: &[usize]| newton_step(leaf_rows, &residuals, &probs))?;

            // out-of-sample rows move too
            let step = tree.predict(x)?;
            log_odds.scaled_add(self.config.learning_rate, &step);

            for (total, v) in importances.iter_mut().zip(tree.raw_importances()) {
                *total += v;
            }
            trees.push(tree);
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }

        self.trees = trees;
        self.initial_log_odds = initial_log_odds;
        self.n_features = n_features;
        self.feature_importances = importances;
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let log_odds = self.decision_function(x)?;
        Ok(binary_proba(log_odds.iter().map(|&lo| sigmoid(lo))))
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.trees.is_empty() {
            return None;
        }
        Some(Array1::from_vec(self.feature_importances.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn data() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [1.0, 0.5], [1.2, 0.1], [0.8, 0.9], [1.1, 0.4], [0.9, 0.2], [1.3, 0.7],
            [4.0, 0.3], [4.2, 0.8], [3.8, 0.6], [4.1, 0.1], [3.9, 0.5], [4.3, 0.9],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_gradient_boosting_classifier() {
        let (x, y) = data();
        let mut gb = GradientBoostingClassifier::new(GradientBoostingConfig {
            n_estimators: 30,
            max_depth: 2,
            subsample: 0.8,
            ..Default::default()
        });
        gb.fit(&x, &y).unwrap();
        assert_eq!(gb.n_trees(), 30);
        assert_eq!(gb.predict(&x).unwrap().to_vec(), y.to_vec());

        let proba = gb.predict_proba(&array![[1.0, 0.5], [4.0, 0.5]]).unwrap();
        assert!(proba[[0, 1]] < 0.2);
        assert!(proba[[1, 1]] > 0.8);
    }

    #[test]
    fn test_newton_step() {
        let residuals = array![0.5, 0.5, -0.5];
        let probs = array![0.5, 0.5, 0.5];
        assert!((newton_step(&[0, 1], &residuals, &probs) - 2.0).abs() < 1e-12);
        assert!((newton_step(&[0, 1, 2], &residuals, &probs) - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(newton_step(&[0], &array![0.0], &array![1.0]), 0.0);
    }

    #[test]
    fn test_importances_favor_signal_column() {
        let (x, y) = data();
        let mut gb = GradientBoostingClassifier::default();
        gb.fit(&x, &y).unwrap();
        let imp = gb.feature_importances().unwrap();
        assert!(imp[0] > imp[1]);
        assert!((imp.sum() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_invalid_config() {
        let (x, y) = data();
        let mut gb = GradientBoostingClassifier::new(GradientBoostingConfig {
            subsample: 1.5,
            ..Default::default()
        });
        assert!(matches!(gb.fit(&x, &y), Err(EnsembleError::InvalidParameter { .. })));
        assert!(matches!(gb.predict_proba(&x), Err(EnsembleError::ModelNotFitted)));
    }
}
