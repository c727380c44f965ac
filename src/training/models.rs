//! Classifier trait and classification metrics

use crate::error::{EnsembleError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// A binary classifier over dense feature matrices.
///
/// Labels are 0.0 (benign) and 1.0 (malignant). `predict_proba` returns one
/// row per sample with columns `[P(0), P(1)]`.
pub trait Classifier: Send + Sync {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Class labels; defaults to the argmax of `predict_proba`
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .axis_iter(Axis(0))
            .map(|p| if p[1] > p[0] { 1.0 } else { 0.0 })
            .collect())
    }

    fn is_fitted(&self) -> bool;

    /// Impurity or split-count importances, normalized to sum to 1
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }

    /// Linear weights in feature space
    fn coefficients(&self) -> Option<Array1<f64>> {
        None
    }
}

/// Reject empty input, length mismatches and labels other than 0/1
pub(crate) fn check_binary_xy(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(EnsembleError::TrainingError("Cannot fit on empty data".to_string()));
    }
    if x.nrows() != y.len() {
        return Err(EnsembleError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if let Some(bad) = y.iter().find(|&&v| v != 0.0 && v != 1.0) {
        return Err(EnsembleError::TrainingError(format!(
            "Binary labels must be 0 or 1, found {}",
            bad
        )));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(EnsembleError::TrainingError(
            "Input contains NaN or infinite values".to_string(),
        ));
    }
    Ok(())
}

/// Reject a prediction matrix whose width differs from the training width
pub(crate) fn check_width(x: &Array2<f64>, n_features: usize) -> Result<()> {
    if x.ncols() != n_features {
        return Err(EnsembleError::ShapeError {
            expected: format!("{} features", n_features),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

/// Stack P(1) into the two-column probability layout
pub(crate) fn binary_proba(p1: impl IntoIterator<Item = f64>) -> Array2<f64> {
    let p1: Vec<f64> = p1.into_iter().map(|p| p.clamp(0.0, 1.0)).collect();
    let mut out = Array2::zeros((p1.len(), 2));
    for (i, p) in p1.into_iter().enumerate() {
        out[[i, 0]] = 1.0 - p;
        out[[i, 1]] = p;
    }
    out
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Fraction of matching labels
pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| (*t - *p).abs() < 0.5)
        .count();
    correct as f64 / y_true.len() as f64
}

/// Area under the ROC curve from positive-class scores.
///
/// Uses the rank-sum formulation with averaged ranks for ties. Returns
/// `None` when only one class is present.
pub fn roc_auc(y_true: &Array1<f64>, scores: &Array1<f64>) -> Option<f64> {
    let n_pos = y_true.iter().filter(|&&v| v > 0.5).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for k in i..=j {
            ranks[order[k]] = avg_rank;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = y_true
        .iter()
        .zip(ranks.iter())
        .filter(|(t, _)| **t > 0.5)
        .map(|(_, r)| r)
        .sum();
    let n_pos = n_pos as f64;
    Some((pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg as f64))
}

/// `[[tn, fp], [fn, tp]]`, rows are true labels
pub fn confusion_matrix(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> [[usize; 2]; 2] {
    let mut cm = [[0usize; 2]; 2];
    for (t, p) in y_true.iter().zip(y_pred.iter()) {
        let t = usize::from(*t > 0.5);
        let p = usize::from(*p > 0.5);
        cm[t][p] += 1;
    }
    cm
}

/// Precision, recall and F1 for one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Per-class report for the Benign/Malignant pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub benign: ClassMetrics,
    pub malignant: ClassMetrics,
    pub accuracy: f64,
}

impl ClassificationReport {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let cm = confusion_matrix(y_true, y_pred);
        let class = |c: usize| {
            let tp = cm[c][c] as f64;
            let predicted = (cm[0][c] + cm[1][c]) as f64;
            let support = cm[c][0] + cm[c][1];
            let precision = if predicted > 0.0 { tp / predicted } else { 0.0 };
            let recall = if support > 0 { tp / support as f64 } else { 0.0 };
            let f1_score = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            ClassMetrics { precision, recall, f1_score, support }
        };
        Self {
            benign: class(0),
            malignant: class(1),
            accuracy: accuracy(y_true, y_pred),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_accuracy_and_confusion() {
        let y = array![0.0, 0.0, 1.0, 1.0, 1.0];
        let p = array![0.0, 1.0, 1.0, 1.0, 0.0];
        assert!((accuracy(&y, &p) - 0.6).abs() < 1e-12);
        assert_eq!(confusion_matrix(&y, &p), [[1, 1], [1, 2]]);
    }

    #[test]
    fn test_roc_auc() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        assert_eq!(roc_auc(&y, &array![0.1, 0.4, 0.35, 0.8]), Some(0.75));
        assert_eq!(roc_auc(&y, &array![0.1, 0.2, 0.8, 0.9]), Some(1.0));
        // all tied scores are uninformative
        assert_eq!(roc_auc(&y, &array![0.5, 0.5, 0.5, 0.5]), Some(0.5));
        assert_eq!(roc_auc(&array![1.0, 1.0], &array![0.2, 0.3]), None);
    }

    #[test]
    fn test_classification_report() {
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0];
        let p = array![0.0, 0.0, 1.0, 1.0, 1.0];
        let report = ClassificationReport::compute(&y, &p);
        assert_eq!(report.benign.support, 3);
        assert_eq!(report.malignant.support, 2);
        assert!((report.benign.precision - 1.0).abs() < 1e-12);
        assert!((report.benign.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((report.malignant.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((report.accuracy - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_check_binary_xy() {
        let x = array![[1.0], [2.0]];
        assert!(check_binary_xy(&x, &array![0.0, 1.0]).is_ok());
        assert!(check_binary_xy(&x, &array![0.0, 2.0]).is_err());
        assert!(check_binary_xy(&x, &array![0.0]).is_err());
        assert!(check_binary_xy(&array![[f64::NAN], [1.0]], &array![0.0, 1.0]).is_err());
    }

    #[test]
    fn test_binary_proba_layout() {
        let p = binary_proba(vec![0.25, 1.5]);
        assert_eq!(p.row(0).to_vec(), vec![0.75, 0.25]);
        assert_eq!(p.row(1).to_vec(), vec![0.0, 1.0]);
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
        assert!(sigmoid(-800.0) >= 0.0 && sigmoid(800.0) <= 1.0);
    }
}
