//! AdaBoost (Adaptive Boosting), SAMME variant
//!
//! Weak learners are depth-1 trees fitted on the current sample weights;
//! misclassified samples are up-weighted for the next round.

use super::decision_tree::DecisionTree;
use super::models::{binary_proba, check_binary_xy, check_width, Classifier};
use crate::error::{EnsembleError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// AdaBoost Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostClassifier {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub random_state: u64,
    stumps: Vec<DecisionTree>,
    alphas: Vec<f64>,
    n_features: usize,
}

impl Default for AdaBoostClassifier {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostClassifier {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            random_state: 42,
            stumps: Vec::new(),
            alphas: Vec::new(),
            n_features: 0,
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Number of weak learners kept (boosting may stop early)
    pub fn n_stumps(&self) -> usize {
        self.stumps.len()
    }
}

impl Classifier for AdaBoostClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if self.n_estimators == 0 || !(self.learning_rate > 0.0) {
            return Err(EnsembleError::InvalidParameter {
                name: "n_estimators/learning_rate".to_string(),
                value: format!("{}/{}", self.n_estimators, self.learning_rate),
                reason: "both must be positive".to_string(),
            });
        }
        check_binary_xy(x, y)?;
        let n_samples = x.nrows();
        let mut weights = Array1::from_elem(n_samples, 1.0 / n_samples as f64);

        let mut stumps = Vec::new();
        let mut alphas = Vec::new();

        for round in 0..self.n_estimators {
            let mut stump = DecisionTree::new_classifier()
                .with_max_depth(Some(1))
                .with_random_state(self.random_state.wrapping_add(round as u64));
            stump.fit_weighted(x, y, &weights)?;

            let labels: Vec<f64> = stump
                .predict(x)?
                .iter()
                .map(|&p| if p > 0.5 { 1.0 } else { 0.0 })
                .collect();
            let miss: Vec<bool> = labels.iter().zip(y.iter()).map(|(p, t)| p != t).collect();
            let error: f64 = weights
                .iter()
                .zip(miss.iter())
                .filter(|(_, m)| **m)
                .map(|(w, _)| w)
                .sum::<f64>()
                / weights.sum();

            if error <= 0.0 {
                // perfect learner; it alone decides
                stumps.push(stump);
                alphas.push(1.0);
                break;
            }
            if error >= 0.5 {
                if stumps.is_empty() {
                    return Err(EnsembleError::TrainingError(
                        "AdaBoost base learner is no better than chance".to_string(),
                    ));
                }
                break;
            }

            // with two classes the SAMME term ln(K - 1) vanishes
            let alpha = self.learning_rate * ((1.0 - error) / error).ln();
            for (w, m) in weights.iter_mut().zip(miss.iter()) {
                if *m {
                    *w *= alpha.exp();
                }
            }
            let w_sum = weights.sum();
            if w_sum > 0.0 {
                weights /= w_sum;
            }

            stumps.push(stump);
            alphas.push(alpha);
        }

        self.stumps = stumps;
        self.alphas = alphas;
        self.n_features = x.ncols();
        Ok(())
    }

    /// Softmax over the alpha-weighted votes, normalized by the total alpha
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.stumps.is_empty() {
            return Err(EnsembleError::ModelNotFitted);
        }
        check_width(x, self.n_features)?;
        let total_alpha: f64 = self.alphas.iter().sum();

        let mut malignant_votes = Array1::<f64>::zeros(x.nrows());
        for (stump, &alpha) in self.stumps.iter().zip(self.alphas.iter()) {
            let preds = stump.predict(x)?;
            for (v, p) in malignant_votes.iter_mut().zip(preds.iter()) {
                if *p > 0.5 {
                    *v += alpha;
                }
            }
        }

        Ok(binary_proba(malignant_votes.iter().map(|&s1| {
            let s1 = s1 / total_alpha;
            let s0 = 1.0 - s1;
            let max = s0.max(s1);
            let e0 = (s0 - max).exp();
            let e1 = (s1 - max).exp();
            e1 / (e0 + e1)
        })))
    }

    fn is_fitted(&self) -> bool {
        !self.stumps.is_empty()
    }

    /// Alpha-weighted stump importances
    fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.stumps.is_empty() {
            return None;
        }
        let mut importances = Array1::zeros(self.n_features);
        for (stump, &alpha) in self.stumps.iter().zip(self.alphas.iter()) {
            if let Some(imp) = stump.feature_importances() {
                importances.scaled_add(alpha, &imp);
            }
        }
        let total = importances.sum();
        if total > 0.0 {
            importances.mapv_inplace(|v| v / total);
        }
        Some(importances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_adaboost_learns_interval() {
        // no single threshold separates the classes
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0], [9.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0];
        let mut ada = AdaBoostClassifier::new(50, 1.0);
        ada.fit(&x, &y).unwrap();
        assert!(ada.n_stumps() > 1);
        let acc = super::super::models::accuracy(&y, &ada.predict(&x).unwrap());
        assert!(acc > 0.7, "accuracy {}", acc);
    }

    #[test]
    fn test_proba_is_soft() {
        let x = array![[1.0, 0.0], [2.0, 1.0], [3.0, 0.0], [7.0, 1.0], [8.0, 0.0], [9.0, 1.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut ada = AdaBoostClassifier::default();
        ada.fit(&x, &y).unwrap();
        let proba = ada.predict_proba(&x).unwrap();
        for (row, label) in proba.rows().into_iter().zip(y.iter()) {
            assert!((row.sum() - 1.0).abs() < 1e-10);
            // softmax over [0, 1] never saturates
            assert!(row[1] < 0.75 && row[1] > 0.25);
            assert_eq!(row[1] > row[0], *label == 1.0);
        }
        let imp = ada.feature_importances().unwrap();
        assert!(imp[0] > imp[1]);
    }

    #[test]
    fn test_invalid_learning_rate() {
        let mut ada = AdaBoostClassifier::new(10, 0.0);
        let x = array![[1.0], [2.0]];
        assert!(ada.fit(&x, &array![0.0, 1.0]).is_err());
    }
}
