//! Support Vector Machine classifier
//!
//! Trained with simplified SMO (Sequential Minimal Optimization) over a
//! precomputed kernel matrix. Probabilities come from a Platt sigmoid fitted
//! on the training decision values.

use super::models::{binary_proba, check_binary_xy, check_width, sigmoid, Classifier};
use crate::error::{EnsembleError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Maximum number of samples for eager kernel matrix computation.
/// Beyond this, training will return an error to prevent OOM.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// RBF width
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Gamma {
    /// `1 / (n_features * Var(X))`
    Scale,
    /// `1 / n_features`
    Auto,
    Value(f64),
}

impl Gamma {
    fn resolve(self, x: &Array2<f64>) -> f64 {
        let n_features = x.ncols().max(1) as f64;
        match self {
            Gamma::Scale => {
                let var = x.var(0.0);
                if var > 0.0 {
                    1.0 / (n_features * var)
                } else {
                    1.0
                }
            }
            Gamma::Auto => 1.0 / n_features,
            Gamma::Value(g) => g,
        }
    }
}

/// Kernel function type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum KernelType {
    /// Linear kernel: K(x, y) = x · y
    Linear,
    /// Radial Basis Function (Gaussian): K(x, y) = exp(-γ * ||x - y||²)
    Rbf { gamma: Gamma },
}

/// SVM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// Kernel function
    pub kernel: KernelType,
    /// Tolerance for stopping criterion
    pub tol: f64,
    /// Maximum number of sweeps over the data
    pub max_iter: usize,
    /// Random seed
    pub random_state: u64,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: KernelType::Rbf { gamma: Gamma::Scale },
            tol: 1e-3,
            max_iter: 200,
            random_state: 42,
        }
    }
}

impl SVMConfig {
    pub fn rbf(c: f64, gamma: Gamma) -> Self {
        Self {
            c,
            kernel: KernelType::Rbf { gamma },
            ..Default::default()
        }
    }

    pub fn linear(c: f64) -> Self {
        Self {
            c,
            kernel: KernelType::Linear,
            ..Default::default()
        }
    }
}

/// Platt sigmoid `P(1|f) = 1 / (1 + exp(a*f + b))`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct PlattScaling {
    a: f64,
    b: f64,
}

impl PlattScaling {
    /// Newton iterations on the regularized log-loss with Platt's target smoothing
    fn fit(decision: &Array1<f64>, y: &Array1<f64>) -> Self {
        let n_pos = y.iter().filter(|&&v| v > 0.5).count() as f64;
        let n_neg = y.len() as f64 - n_pos;
        let hi = (n_pos + 1.0) / (n_pos + 2.0);
        let lo = 1.0 / (n_neg + 2.0);
        let targets: Vec<f64> = y.iter().map(|&v| if v > 0.5 { hi } else { lo }).collect();

        let mut a = 0.0;
        let mut b = ((n_neg + 1.0) / (n_pos + 1.0)).ln();
        for _ in 0..100 {
            let (mut g_a, mut g_b) = (0.0, 0.0);
            let (mut h_aa, mut h_ab, mut h_bb) = (1e-12, 0.0, 1e-12);
            for (f, t) in decision.iter().zip(targets.iter()) {
                // P(1) under the current fit
                let p = sigmoid(-(a * f + b));
                let d = t - p;
                g_a += d * f;
                g_b += d;
                let w = p * (1.0 - p);
                h_aa += w * f * f;
                h_ab += w * f;
                h_bb += w;
            }
            let det = h_aa * h_bb - h_ab * h_ab;
            if det.abs() < 1e-18 {
                break;
            }
            let step_a = (h_bb * g_a - h_ab * g_b) / det;
            let step_b = (h_aa * g_b - h_ab * g_a) / det;
            a -= step_a;
            b -= step_b;
            if step_a.abs() < 1e-10 && step_b.abs() < 1e-10 {
                break;
            }
        }
        Self { a, b }
    }

    fn probability(&self, f: f64) -> f64 {
        sigmoid(-(self.a * f + self.b))
    }
}

/// Support Vector Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMClassifier {
    pub config: SVMConfig,
    support_vectors: Option<Array2<f64>>,
    /// alpha_i * y_i per support vector
    dual_coef: Option<Array1<f64>>,
    bias: f64,
    gamma: f64,
    platt: Option<PlattScaling>,
    n_features: usize,
}

impl Default for SVMClassifier {
    fn default() -> Self {
        Self::new(SVMConfig::default())
    }
}

impl SVMClassifier {
    /// Create a new SVM classifier
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            support_vectors: None,
            dual_coef: None,
            bias: 0.0,
            gamma: 1.0,
            platt: None,
            n_features: 0,
        }
    }

    fn kernel(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match self.config.kernel {
            KernelType::Linear => a.dot(&b),
            KernelType::Rbf { .. } => {
                let sq: f64 = a.iter().zip(b.iter()).map(|(u, v)| (u - v) * (u - v)).sum();
                (-self.gamma * sq).exp()
            }
        }
    }

    fn compute_kernel_matrix(&self, x: &Array2<f64>) -> Array2<f64> {
        let n = x.nrows();
        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| (0..n).map(|j| self.kernel(x.row(i), x.row(j))).collect())
            .collect();
        let mut k = Array2::zeros((n, n));
        for (i, row) in rows.into_iter().enumerate() {
            for (j, v) in row.into_iter().enumerate() {
                k[[i, j]] = v;
            }
        }
        k
    }

    /// SMO over labels in {-1, +1}; returns (alphas, bias)
    fn smo_train(&self, kernel_matrix: &Array2<f64>, y: &Array1<f64>) -> (Array1<f64>, f64) {
        let n = y.len();
        let c = self.config.c;
        let tol = self.config.tol;
        let mut alphas = Array1::<f64>::zeros(n);
        let mut bias = 0.0;
        // f(x_i) - b maintained incrementally
        let mut f_cache = Array1::<f64>::zeros(n);

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);

        let mut passes = 0;
        let max_passes = 5;
        let mut total_iter = 0;

        while n > 1 && passes < max_passes && total_iter < self.config.max_iter {
            let mut num_changed = 0;

            for i in 0..n {
                let e_i = f_cache[i] + bias - y[i];

                // KKT violation
                if (y[i] * e_i < -tol && alphas[i] < c) || (y[i] * e_i > tol && alphas[i] > 0.0) {
                    let j = loop {
                        let j = rng.gen_range(0..n);
                        if j != i {
                            break j;
                        }
                    };
                    let e_j = f_cache[j] + bias - y[j];

                    let alpha_i_old = alphas[i];
                    let alpha_j_old = alphas[j];

                    let (l, h) = if y[i] != y[j] {
                        ((alpha_j_old - alpha_i_old).max(0.0), (c + alpha_j_old - alpha_i_old).min(c))
                    } else {
                        ((alpha_i_old + alpha_j_old - c).max(0.0), (alpha_i_old + alpha_j_old).min(c))
                    };
                    if (l - h).abs() < 1e-10 {
                        continue;
                    }

                    let eta = 2.0 * kernel_matrix[[i, j]] - kernel_matrix[[i, i]] - kernel_matrix[[j, j]];
                    if eta >= 0.0 {
                        continue;
                    }

                    let alpha_j = (alpha_j_old - y[j] * (e_i - e_j) / eta).clamp(l, h);
                    if (alpha_j - alpha_j_old).abs() < 1e-5 {
                        continue;
                    }
                    let alpha_i = alpha_i_old + y[i] * y[j] * (alpha_j_old - alpha_j);

                    let d_i = y[i] * (alpha_i - alpha_i_old);
                    let d_j = y[j] * (alpha_j - alpha_j_old);

                    let b1 = bias - e_i - d_i * kernel_matrix[[i, i]] - d_j * kernel_matrix[[i, j]];
                    let b2 = bias - e_j - d_i * kernel_matrix[[i, j]] - d_j * kernel_matrix[[j, j]];
                    bias = if alpha_i > 0.0 && alpha_i < c {
                        b1
                    } else if alpha_j > 0.0 && alpha_j < c {
                        b2
                    } else {
                        (b1 + b2) / 2.0
                    };

                    alphas[i] = alpha_i;
                    alphas[j] = alpha_j;
                    f_cache.scaled_add(d_i, &kernel_matrix.row(i));
                    f_cache.scaled_add(d_j, &kernel_matrix.row(j));

                    num_changed += 1;
                }
            }

            total_iter += 1;
            if num_changed == 0 {
                passes += 1;
            } else {
                passes = 0;
            }
        }

        (alphas, bias)
    }

    /// Signed distance to the separating surface
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (sv, coef) = match (&self.support_vectors, &self.dual_coef) {
            (Some(sv), Some(coef)) => (sv, coef),
            _ => return Err(EnsembleError::ModelNotFitted),
        };
        check_width(x, self.n_features)?;
        Ok(x.axis_iter(Axis(0))
            .into_par_iter()
            .map(|row| {
                sv.axis_iter(Axis(0))
                    .zip(coef.iter())
                    .map(|(s, c)| c * self.kernel(row, s))
                    .sum::<f64>()
                    + self.bias
            })
            .collect::<Vec<f64>>()
            .into())
    }

    pub fn n_support_vectors(&self) -> usize {
        self.support_vectors.as_ref().map_or(0, |sv| sv.nrows())
    }
}

impl Classifier for SVMClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if !(self.config.c > 0.0) {
            return Err(EnsembleError::InvalidParameter {
                name: "C".to_string(),
                value: self.config.c.to_string(),
                reason: "must be strictly positive".to_string(),
            });
        }
        if let KernelType::Rbf { gamma: Gamma::Value(g) } = self.config.kernel {
            if !(g > 0.0) {
                return Err(EnsembleError::InvalidParameter {
                    name: "gamma".to_string(),
                    value: g.to_string(),
                    reason: "must be strictly positive".to_string(),
                });
            }
        }
        check_binary_xy(x, y)?;
        let n = x.nrows();
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(EnsembleError::TrainingError(format!(
                "Dataset has {} samples, exceeding the maximum {} for SVM kernel matrix",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }
        if y.iter().all(|&v| v == y[0]) {
            return Err(EnsembleError::TrainingError(
                "SVM requires both classes in the training data".to_string(),
            ));
        }

        self.gamma = match self.config.kernel {
            KernelType::Rbf { gamma } => gamma.resolve(x),
            KernelType::Linear => 1.0,
        };
        self.n_features = x.ncols();

        let y_signed = y.mapv(|v| if v > 0.5 { 1.0 } else { -1.0 });
        let kernel_matrix = self.compute_kernel_matrix(x);
        let (alphas, bias) = self.smo_train(&kernel_matrix, &y_signed);

        let support: Vec<usize> = (0..n).filter(|&i| alphas[i] > 1e-8).collect();
        self.support_vectors = Some(x.select(Axis(0), &support));
        self.dual_coef = Some(support.iter().map(|&i| alphas[i] * y_signed[i]).collect());
        self.bias = bias;

        let decision = self.decision_function(x)?;
        self.platt = Some(PlattScaling::fit(&decision, y));
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let platt = self.platt.ok_or(EnsembleError::ModelNotFitted)?;
        let decision = self.decision_function(x)?;
        Ok(binary_proba(decision.iter().map(|&f| platt.probability(f))))
    }

    /// Sign of the decision function, independent of the Platt fit
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(|f| if f > 0.0 { 1.0 } else { 0.0 }))
    }

    fn is_fitted(&self) -> bool {
        self.platt.is_some()
    }

    /// Primal weights, linear kernel only
    fn coefficients(&self) -> Option<Array1<f64>> {
        if self.config.kernel != KernelType::Linear {
            return None;
        }
        let sv = self.support_vectors.as_ref()?;
        let coef = self.dual_coef.as_ref()?;
        Some(sv.t().dot(coef))
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        let w = self.coefficients()?.mapv(f64::abs);
        let total = w.sum();
        Some(if total > 0.0 { w / total } else { w })
    }
}
