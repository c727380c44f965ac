//! Linear models

use super::models::{binary_proba, check_binary_xy, check_width, sigmoid, Classifier};
use crate::error::{EnsembleError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// L2-regularized logistic regression for binary classification.
///
/// `c` is the inverse regularization strength: the penalty applied to the
/// mean log-loss gradient is `w / (c * n_samples)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Fitted coefficients
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept
    pub intercept: Option<f64>,
    /// Inverse regularization strength
    pub c: f64,
    /// Maximum iterations
    pub max_iter: usize,
    /// Convergence tolerance on the gradient norm
    pub tol: f64,
    /// Learning rate
    pub learning_rate: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    /// Create a new logistic regression model
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            c: 1.0,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.1,
        }
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set learning rate
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    fn linear(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(EnsembleError::ModelNotFitted)?;
        check_width(x, coefficients.len())?;
        Ok(x.dot(coefficients) + self.intercept.unwrap_or(0.0))
    }
}

impl Classifier for LogisticRegression {
    /// Batch gradient descent
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if !(self.c > 0.0) {
            return Err(EnsembleError::InvalidParameter {
                name: "C".to_string(),
                value: self.c.to_string(),
                reason: "must be strictly positive".to_string(),
            });
        }
        check_binary_xy(x, y)?;
        let n_samples = x.nrows();
        let alpha = 1.0 / (self.c * n_samples as f64);
        let lr = self.learning_rate;

        let mut weights = Array1::<f64>::zeros(x.ncols());
        let mut bias = 0.0;

        for _iter in 0..self.max_iter {
            let predictions = (x.dot(&weights) + bias).mapv(sigmoid);

            let errors = &predictions - y;
            let dw = (x.t().dot(&errors) / n_samples as f64) + (alpha * &weights);
            let db = errors.mean().unwrap_or(0.0);

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if grad_norm < self.tol {
                break;
            }

            weights = weights - lr * dw;
            bias -= lr * db;
        }

        self.coefficients = Some(weights);
        self.intercept = Some(bias);
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let linear = self.linear(x)?;
        Ok(binary_proba(linear.iter().map(|&z| sigmoid(z))))
    }

    fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }

    fn coefficients(&self) -> Option<Array1<f64>> {
        self.coefficients.clone()
    }

    /// Normalized coefficient magnitudes
    fn feature_importances(&self) -> Option<Array1<f64>> {
        let w = self.coefficients.as_ref()?.mapv(f64::abs);
        let total = w.sum();
        Some(if total > 0.0 { w / total } else { w })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_logistic_regression() {
        let x = array![
            [1.0, 1.0],
            [1.5, 1.5],
            [2.0, 2.0],
            [5.0, 5.0],
            [5.5, 5.5],
            [6.0, 6.0],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut model = LogisticRegression::new()
            .with_max_iter(1000)
            .with_learning_rate(0.5);

        model.fit(&x, &y).unwrap();
        assert!(model.is_fitted());

        let preds = model.predict(&x).unwrap();
        let accuracy = super::super::models::accuracy(&y, &preds);
        assert!(accuracy >= 0.8, "Accuracy should be >= 0.8, got {}", accuracy);
    }

    #[test]
    fn test_predict_proba() {
        let x = array![[0.0, 0.0], [10.0, 10.0]];
        let y = array![0.0, 1.0];

        let mut model = LogisticRegression::new().with_max_iter(500);
        model.fit(&x, &y).unwrap();

        let proba = model.predict_proba(&x).unwrap();
        assert!(proba[[0, 1]] < 0.5);
        assert!(proba[[1, 1]] > 0.5);
    }

    #[test]
    fn test_stronger_penalty_shrinks_weights() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut loose = LogisticRegression::new().with_c(100.0);
        let mut tight = LogisticRegression::new().with_c(0.01);
        loose.fit(&x, &y).unwrap();
        tight.fit(&x, &y).unwrap();
        let wl = loose.coefficients().unwrap()[0];
        let wt = tight.coefficients().unwrap()[0];
        assert!(wt.abs() < wl.abs());
    }

    #[test]
    fn test_unfitted() {
        let model = LogisticRegression::new();
        assert!(matches!(model.predict_proba(&array![[1.0]]), Err(EnsembleError::ModelNotFitted)));
        assert!(model.feature_importances().is_none());
    }
}
