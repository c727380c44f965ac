//! Weighted soft voting over a trained bundle

use super::bundle::EnsembleBundle;
use crate::error::{EnsembleError, Result};
use crate::training::Classifier;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

const LOG_EPS: f64 = 1e-10;

/// Predicted class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Diagnosis {
    Benign,
    Malignant,
}

impl Diagnosis {
    pub fn from_label(label: f64) -> Self {
        if label >= 0.5 {
            Diagnosis::Malignant
        } else {
            Diagnosis::Benign
        }
    }

    pub fn label(self) -> f64 {
        match self {
            Diagnosis::Benign => 0.0,
            Diagnosis::Malignant => 1.0,
        }
    }
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnosis::Benign => write!(f, "Benign"),
            Diagnosis::Malignant => write!(f, "Malignant"),
        }
    }
}

/// Coarse risk bucket from diagnosis and confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    #[serde(rename = "Low-Medium")]
    LowMedium,
    Medium,
    #[serde(rename = "Medium-High")]
    MediumHigh,
    High,
}

impl RiskLevel {
    /// Thresholds are strict: a confidence of exactly 0.9 is not "high"
    pub fn from_prediction(diagnosis: Diagnosis, confidence: f64) -> Self {
        match diagnosis {
            Diagnosis::Benign if confidence > 0.9 => RiskLevel::Low,
            Diagnosis::Benign if confidence > 0.7 => RiskLevel::LowMedium,
            Diagnosis::Malignant if confidence > 0.9 => RiskLevel::High,
            Diagnosis::Malignant if confidence > 0.7 => RiskLevel::MediumHigh,
            _ => RiskLevel::Medium,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::LowMedium => "Low-Medium",
            RiskLevel::Medium => "Medium",
            RiskLevel::MediumHigh => "Medium-High",
            RiskLevel::High => "High",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities {
    pub benign: f64,
    pub malignant: f64,
}

impl ClassProbabilities {
    pub fn max(&self) -> f64 {
        self.benign.max(self.malignant)
    }

    /// Argmax, ties to benign
    pub fn diagnosis(&self) -> Diagnosis {
        if self.malignant > self.benign {
            Diagnosis::Malignant
        } else {
            Diagnosis::Benign
        }
    }
}

/// One member's vote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndividualPrediction {
    pub prediction: Diagnosis,
    pub probabilities: ClassProbabilities,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub prediction: Diagnosis,
    pub confidence: f64,
    /// Entropy of the averaged distribution, in bits
    pub uncertainty: f64,
    pub risk_level: RiskLevel,
    pub probabilities: ClassProbabilities,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub individual_predictions: Option<BTreeMap<String, IndividualPrediction>>,
    /// Members skipped because they errored on this input
    pub failed_models: Vec<String>,
}

impl PredictionResult {
    fn from_probabilities(probabilities: ClassProbabilities, failed_models: Vec<String>) -> Self {
        let prediction = probabilities.diagnosis();
        let confidence = probabilities.max();
        Self {
            prediction,
            confidence,
            uncertainty: entropy_uncertainty(&[probabilities.benign, probabilities.malignant]),
            risk_level: RiskLevel::from_prediction(prediction, confidence),
            probabilities,
            individual_predictions: None,
            failed_models,
        }
    }
}

/// Shannon entropy in bits: `-Σ p·ln(p + 1e-10) / ln 2`, clamped to [0, 1]
pub fn entropy_uncertainty(probabilities: &[f64]) -> f64 {
    let h: f64 = probabilities.iter().map(|&p| -p * (p + LOG_EPS).ln()).sum();
    (h / std::f64::consts::LN_2).clamp(0.0, 1.0)
}

/// Per-member probability matrices for scaled input, split into survivors and failures.
///
/// Non-finite input fails every member; a member returning non-finite
/// probabilities fails on its own.
fn member_probabilities(bundle: &EnsembleBundle, x: &Array2<f64>) -> (Vec<(usize, Array2<f64>)>, Vec<(String, String)>) {
    let mut ok = Vec::with_capacity(bundle.members.len());
    let mut failed = Vec::new();
    if x.iter().any(|v| !v.is_finite()) {
        warn!("Input contains non-finite values after scaling");
        let reason = "input contains NaN or infinite values".to_string();
        failed.extend(bundle.members.iter().map(|m| (m.name.clone(), reason.clone())));
        return (ok, failed);
    }
    for (idx, member) in bundle.members.iter().enumerate() {
        match member.model.predict_proba(x) {
            Ok(p) if p.iter().any(|v| !v.is_finite()) => {
                warn!(model = %member.name, "Model returned non-finite probabilities");
                failed.push((member.name.clone(), "non-finite probabilities".to_string()));
            }
            Ok(p) if p.nrows() == x.nrows() && p.ncols() == 2 => ok.push((idx, p)),
            Ok(p) => failed.push((
                member.name.clone(),
                format!("unexpected probability shape {:?}", p.shape()),
            )),
            Err(e) => {
                warn!(model = %member.name, error = %e, "Model prediction failed");
                failed.push((member.name.clone(), e.to_string()));
            }
        }
    }
    (ok, failed)
}

/// Weighted mean of the survivors' probabilities, weights renormalized over them
fn weighted_average(bundle: &EnsembleBundle, probs: &[(usize, Array2<f64>)], n_rows: usize) -> Array2<f64> {
    let total: f64 = probs.iter().map(|(i, _)| bundle.members[*i].weight).sum();
    let mut avg = Array2::<f64>::zeros((n_rows, 2));
    for (i, p) in probs {
        let w = if total > 0.0 {
            bundle.members[*i].weight / total
        } else {
            1.0 / probs.len() as f64
        };
        avg.scaled_add(w, p);
    }
    avg
}

/// Predict one already-enhanced feature row
pub fn predict(features: &[f64], bundle: &EnsembleBundle, return_individual: bool) -> Result<PredictionResult> {
    if features.len() != bundle.n_features() {
        return Err(EnsembleError::ShapeError {
            expected: format!("{} features", bundle.n_features()),
            actual: format!("{} features", features.len()),
        });
    }

    let x = bundle.scaler.transform_row(features)?.insert_axis(Axis(0));
    let (probs, failed) = member_probabilities(bundle, &x);
    if probs.is_empty() {
        return Err(EnsembleError::NoValidPredictions { failures: failed });
    }

    let avg = weighted_average(bundle, &probs, 1);
    let mut result = PredictionResult::from_probabilities(
        ClassProbabilities {
            benign: avg[[0, 0]],
            malignant: avg[[0, 1]],
        },
        failed.into_iter().map(|(name, _)| name).collect(),
    );

    if return_individual {
        let individual = probs
            .iter()
            .map(|(i, p)| {
                let probabilities = ClassProbabilities {
                    benign: p[[0, 0]],
                    malignant: p[[0, 1]],
                };
                (
                    bundle.members[*i].name.clone(),
                    IndividualPrediction {
                        prediction: probabilities.diagnosis(),
                        confidence: probabilities.max(),
                        probabilities,
                    },
                )
            })
            .collect();
        result.individual_predictions = Some(individual);
    }

    Ok(result)
}

/// Predict every row of an unscaled feature matrix
pub fn predict_batch(x: &Array2<f64>, bundle: &EnsembleBundle) -> Result<Vec<PredictionResult>> {
    if x.ncols() != bundle.n_features() {
        return Err(EnsembleError::ShapeError {
            expected: format!("{} features", bundle.n_features()),
            actual: format!("{} features", x.ncols()),
        });
    }

    let scaled = bundle.scaler.transform(x)?;
    let (probs, failed) = member_probabilities(bundle, &scaled);
    if probs.is_empty() {
        return Err(EnsembleError::NoValidPredictions { failures: failed });
    }

    let failed_names: Vec<String> = failed.into_iter().map(|(name, _)| name).collect();
    let avg = weighted_average(bundle, &probs, x.nrows());
    Ok(avg
        .outer_iter()
        .map(|row| {
            PredictionResult::from_probabilities(
                ClassProbabilities {
                    benign: row[0],
                    malignant: row[1],
                },
                failed_names.clone(),
            )
        })
        .collect())
}

/// Predicted labels of a batch, as 0/1
pub fn labels(results: &[PredictionResult]) -> Array1<f64> {
    results.iter().map(|r| r.prediction.label()).collect()
}
