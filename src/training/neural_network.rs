//! Neural Network (Multi-Layer Perceptron) classifier
//!
//! A feedforward network with a single sigmoid output trained on log-loss
//! with mini-batch Adam. Holds out a validation slice for early stopping and
//! restores the best weights seen.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::models::{binary_proba, check_binary_xy, check_width, sigmoid, Classifier};
use crate::error::{EnsembleError, Result};

/// Hidden-layer activation function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Activation {
    /// Rectified Linear Unit
    #[default]
    ReLU,
    /// Logistic sigmoid
    Sigmoid,
    /// Hyperbolic tangent
    Tanh,
}

impl Activation {
    fn apply(self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::ReLU => z.mapv(|v| v.max(0.0)),
            Activation::Sigmoid => z.mapv(sigmoid),
            Activation::Tanh => z.mapv(f64::tanh),
        }
    }

    fn derivative(self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::ReLU => z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::Sigmoid => z.mapv(|v| {
                let s = sigmoid(v);
                s * (1.0 - s)
            }),
            Activation::Tanh => z.mapv(|v| 1.0 - v.tanh().powi(2)),
        }
    }
}

/// Neural Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLPConfig {
    /// Hidden layer sizes
    pub hidden_layers: Vec<usize>,
    /// Activation function for hidden layers
    pub activation: Activation,
    /// Initial Adam step size
    pub learning_rate: f64,
    /// Divide the step size by 5 whenever validation loss stalls for two epochs
    pub adaptive_learning_rate: bool,
    /// Number of epochs
    pub max_epochs: usize,
    /// Batch size
    pub batch_size: usize,
    /// L2 regularization
    pub alpha: f64,
    /// Random seed
    pub random_state: u64,
    pub early_stopping: bool,
    /// Epochs without improvement before stopping
    pub early_stopping_patience: usize,
    /// Validation split for early stopping
    pub validation_split: f64,
    /// Minimum validation loss improvement
    pub tol: f64,
}

impl Default for MLPConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![100],
            activation: Activation::ReLU,
            learning_rate: 0.001,
            adaptive_learning_rate: false,
            max_epochs: 200,
            batch_size: 200,
            alpha: 0.0001,
            random_state: 42,
            early_stopping: false,
            early_stopping_patience: 10,
            validation_split: 0.1,
            tol: 1e-4,
        }
    }
}

/// Adam first and second moments for one layer
#[derive(Debug, Clone)]
struct AdamState {
    m_w: Array2<f64>,
    v_w: Array2<f64>,
    m_b: Array1<f64>,
    v_b: Array1<f64>,
}

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const ADAM_EPS: f64 = 1e-8;

/// Multi-Layer Perceptron Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLPClassifier {
    pub config: MLPConfig,
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
    n_features: usize,
    /// Epochs actually run
    n_epochs: usize,
    is_fitted: bool,
}

impl Default for MLPClassifier {
    fn default() -> Self {
        Self::new(MLPConfig::default())
    }
}

impl MLPClassifier {
    pub fn new(config: MLPConfig) -> Self {
        Self {
            config,
            weights: Vec::new(),
            biases: Vec::new(),
            n_features: 0,
            n_epochs: 0,
            is_fitted: false,
        }
    }

    pub fn n_epochs(&self) -> usize {
        self.n_epochs
    }

    fn validate_config(&self) -> Result<()> {
        let c = &self.config;
        let reason = if c.hidden_layers.iter().any(|&h| h == 0) {
            Some(("hidden_layers", format!("{:?}", c.hidden_layers), "layer sizes must be positive"))
        } else if !(c.learning_rate > 0.0) {
            Some(("learning_rate", c.learning_rate.to_string(), "must be positive"))
        } else if c.alpha < 0.0 {
            Some(("alpha", c.alpha.to_string(), "must be non-negative"))
        } else if c.batch_size == 0 || c.max_epochs == 0 {
            Some(("batch_size/max_epochs", format!("{}/{}", c.batch_size, c.max_epochs), "must be positive"))
        } else if !(0.0..1.0).contains(&c.validation_split) {
            Some(("validation_split", c.validation_split.to_string(), "must be in [0, 1)"))
        } else {
            None
        };
        match reason {
            Some((name, value, reason)) => Err(EnsembleError::InvalidParameter {
                name: name.to_string(),
                value,
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn initialize_weights(&mut self, rng: &mut Xoshiro256PlusPlus) {
        self.weights.clear();
        self.biases.clear();

        let mut layer_sizes = vec![self.n_features];
        layer_sizes.extend(&self.config.hidden_layers);
        layer_sizes.push(1);

        for pair in layer_sizes.windows(2) {
            let (n_in, n_out) = (pair[0], pair[1]);
            // Glorot uniform
            let bound = (6.0 / (n_in + n_out) as f64).sqrt();
            self.weights
                .push(Array2::from_shape_fn((n_in, n_out), |_| rng.gen_range(-bound..bound)));
            self.biases.push(Array1::zeros(n_out));
        }
    }

    /// Pre-activations and activations per layer; the last activation is P(1)
    fn forward(&self, x: &Array2<f64>) -> (Vec<Array2<f64>>, Vec<Array2<f64>>) {
        let mut activations = vec![x.clone()];
        let mut z_values = Vec::with_capacity(self.weights.len());
        let last = self.weights.len() - 1;

        for (i, (w, b)) in self.weights.iter().zip(self.biases.iter()).enumerate() {
            let z = activations[i].dot(w) + b;
            let a = if i < last { self.config.activation.apply(&z) } else { z.mapv(sigmoid) };
            z_values.push(z);
            activations.push(a);
        }
        (activations, z_values)
    }

    fn backward(
        &self,
        y: &Array1<f64>,
        activations: &[Array2<f64>],
        z_values: &[Array2<f64>],
    ) -> Vec<(Array2<f64>, Array1<f64>)> {
        let n = y.len() as f64;
        let mut gradients = Vec::with_capacity(self.weights.len());

        // sigmoid + log-loss
        let y_col = y.view().insert_axis(Axis(1));
        let mut delta = (&activations[activations.len() - 1] - &y_col) / n;

        for i in (0..self.weights.len()).rev() {
            let grad_w = activations[i].t().dot(&delta) + &self.weights[i] * (self.config.alpha / n);
            let grad_b = delta.sum_axis(Axis(0));
            if i > 0 {
                delta = delta.dot(&self.weights[i].t()) * self.config.activation.derivative(&z_values[i - 1]);
            }
            gradients.push((grad_w, grad_b));
        }
        gradients.reverse();
        gradients
    }

    fn log_loss(&self, x: &Array2<f64>, y: &Array1<f64>) -> f64 {
        let (activations, _) = self.forward(x);
        let p = &activations[activations.len() - 1];
        let eps = 1e-12;
        let loss: f64 = p
            .iter()
            .zip(y.iter())
            .map(|(p, t)| {
                let p = p.clamp(eps, 1.0 - eps);
                -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
            })
            .sum();
        loss / y.len().max(1) as f64
    }
}

impl Classifier for MLPClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.validate_config()?;
        check_binary_xy(x, y)?;
        let n_samples = x.nrows();
        self.n_features = x.ncols();

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        self.initialize_weights(&mut rng);

        let mut order: Vec<usize> = (0..n_samples).collect();
        order.shuffle(&mut rng);
        let val_size = if self.config.early_stopping {
            ((n_samples as f64 * self.config.validation_split) as usize).min(n_samples - 1)
        } else {
            0
        };
        let (val_idx, train_idx) = order.split_at(val_size);
        let x_train = x.select(Axis(0), train_idx);
        let y_train = y.select(Axis(0), train_idx);
        let x_val = x.select(Axis(0), val_idx);
        let y_val = y.select(Axis(0), val_idx);
        let train_size = train_idx.len();
        let use_validation = val_size > 0;

        let mut adam: Vec<AdamState> = self
            .weights
            .iter()
            .zip(self.biases.iter())
            .map(|(w, b)| AdamState {
                m_w: Array2::zeros(w.raw_dim()),
                v_w: Array2::zeros(w.raw_dim()),
                m_b: Array1::zeros(b.len()),
                v_b: Array1::zeros(b.len()),
            })
            .collect();

        let mut learning_rate = self.config.learning_rate;
        let mut step = 0i32;
        let mut best_loss = f64::INFINITY;
        let mut best_params = (self.weights.clone(), self.biases.clone());
        let mut no_improvement = 0;
        let batch_size = self.config.batch_size.min(train_size);

        let mut indices: Vec<usize> = (0..train_size).collect();
        self.n_epochs = 0;
        for _epoch in 0..self.config.max_epochs {
            self.n_epochs += 1;
            indices.shuffle(&mut rng);

            for batch in indices.chunks(batch_size) {
                let x_batch = x_train.select(Axis(0), batch);
                let y_batch = y_train.select(Axis(0), batch);

                let (activations, z_values) = self.forward(&x_batch);
                let gradients = self.backward(&y_batch, &activations, &z_values);

                step += 1;
                let bias_c1 = 1.0 - BETA1.powi(step);
                let bias_c2 = 1.0 - BETA2.powi(step);
                let lr_t = learning_rate * bias_c2.sqrt() / bias_c1;

                for (i, (grad_w, grad_b)) in gradients.into_iter().enumerate() {
                    let s = &mut adam[i];
                    s.m_w = &s.m_w * BETA1 + &grad_w * (1.0 - BETA1);
                    s.v_w = &s.v_w * BETA2 + &grad_w.mapv(|g| g * g) * (1.0 - BETA2);
                    s.m_b = &s.m_b * BETA1 + &grad_b * (1.0 - BETA1);
                    s.v_b = &s.v_b * BETA2 + &grad_b.mapv(|g| g * g) * (1.0 - BETA2);

                    self.weights[i] = &self.weights[i] - &(lr_t * &s.m_w / (s.v_w.mapv(f64::sqrt) + ADAM_EPS));
                    self.biases[i] = &self.biases[i] - &(lr_t * &s.m_b / (s.v_b.mapv(f64::sqrt) + ADAM_EPS));
                }
            }

            let loss = if use_validation {
                self.log_loss(&x_val, &y_val)
            } else {
                self.log_loss(&x_train, &y_train)
            };
            if !loss.is_finite() {
                return Err(EnsembleError::TrainingError("MLP loss diverged".to_string()));
            }

            if loss < best_loss - self.config.tol {
                best_loss = loss;
                best_params = (self.weights.clone(), self.biases.clone());
                no_improvement = 0;
            } else {
                no_improvement += 1;
                if self.config.adaptive_learning_rate && no_improvement % 2 == 0 {
                    learning_rate /= 5.0;
                }
                if self.config.early_stopping && no_improvement >= self.config.early_stopping_patience {
                    break;
                }
            }
        }

        if use_validation {
            (self.weights, self.biases) = best_params;
        }
        self.is_fitted = true;
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(EnsembleError::ModelNotFitted);
        }
        check_width(x, self.n_features)?;
        let (activations, _) = self.forward(x);
        let out = &activations[activations.len() - 1];
        Ok(binary_proba(out.column(0).iter().copied()))
    }

    fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn create_classification_data() -> (Array2<f64>, Array1<f64>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40 {
            let t = i as f64 / 40.0;
            rows.extend([-1.0 - t, -0.5 + t * 0.3]);
            labels.push(0.0);
            rows.extend([1.0 + t, 0.5 - t * 0.3]);
            labels.push(1.0);
        }
        (Array2::from_shape_vec((80, 2), rows).unwrap(), Array1::from_vec(labels))
    }

    #[test]
    fn test_mlp_classifier() {
        let (x, y) = create_classification_data();
        let mut mlp = MLPClassifier::new(MLPConfig {
            hidden_layers: vec![8, 4],
            learning_rate: 0.01,
            max_epochs: 200,
            batch_size: 16,
            ..Default::default()
        });
        mlp.fit(&x, &y).unwrap();
        let preds = mlp.predict(&x).unwrap();
        let acc = super::super::models::accuracy(&y, &preds);
        assert!(acc > 0.95, "accuracy {}", acc);

        let proba = mlp.predict_proba(&array![[-2.0, 0.0], [2.0, 0.0]]).unwrap();
        assert!(proba[[0, 1]] < 0.5 && proba[[1, 1]] > 0.5);
    }

    #[test]
    fn test_early_stopping_halts() {
        let (x, y) = create_classification_data();
        let mut mlp = MLPClassifier::new(MLPConfig {
            hidden_layers: vec![10],
            learning_rate: 0.05,
            max_epochs: 1000,
            early_stopping: true,
            adaptive_learning_rate: true,
            ..Default::default()
        });
        mlp.fit(&x, &y).unwrap();
        assert!(mlp.n_epochs() < 1000);
        assert!(mlp.is_fitted());
    }

    #[test]
    fn test_activation_functions() {
        let z = array![[-1.0, 0.0, 2.0]];
        assert_eq!(Activation::ReLU.apply(&z), array![[0.0, 0.0, 2.0]]);
        assert_eq!(Activation::ReLU.derivative(&z), array![[0.0, 0.0, 1.0]]);
        assert!((Activation::Sigmoid.apply(&z)[[0, 1]] - 0.5).abs() < 1e-12);
        assert!((Activation::Tanh.derivative(&z)[[0, 1]] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_layer_size() {
        let (x, y) = create_classification_data();
        let mut mlp = MLPClassifier::new(MLPConfig {
            hidden_layers: vec![0],
            ..Default::default()
        });
        assert!(matches!(mlp.fit(&x, &y), Err(EnsembleError::InvalidParameter { .. })));
    }
}
