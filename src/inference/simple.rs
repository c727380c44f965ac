//! Single random-forest predictor on the 30 raw features
//!
//! Independent of the ensemble: its own scaler, its own artifacts and its own
//! lazy load on first use.

use crate::data::TrainingSet;
use crate::ensemble::{ClassProbabilities, Diagnosis, RiskLevel};
use crate::error::{EnsembleError, Result};
use crate::features::{FeatureVector, FEATURE_NAMES, N_FEATURES};
use crate::preprocessing::Scaler;
use crate::store::{read_json, write_json};
use crate::training::{accuracy, confusion_matrix, ClassificationReport, Classifier, RandomForest};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

const MODEL_FILE: &str = "breast_cancer_model.json";
const SCALER_FILE: &str = "scaler.json";
const SEED: u64 = 42;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleTrainingReport {
    pub accuracy: f64,
    pub classification_report: ClassificationReport,
    pub confusion_matrix: [[usize; 2]; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimplePrediction {
    pub prediction: Diagnosis,
    pub confidence: f64,
    pub risk_level: RiskLevel,
    pub probabilities: ClassProbabilities,
}

#[derive(Debug)]
struct Fitted {
    model: RandomForest,
    scaler: Scaler,
}

/// Random forest with standard scaling, persisted as two JSON artifacts
#[derive(Debug)]
pub struct SimplePredictor {
    dir: PathBuf,
    state: RwLock<Option<Arc<Fitted>>>,
}

impl SimplePredictor {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            state: RwLock::new(None),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_trained(&self) -> bool {
        self.state.read().is_some()
    }

    fn forest() -> RandomForest {
        RandomForest::new(100)
            .with_max_depth(Some(10))
            .with_min_samples_split(5)
            .with_min_samples_leaf(2)
            .with_random_state(SEED)
    }

    /// Fit on the canonical 30 columns, evaluate on a stratified 20% holdout
    /// and persist
    pub fn train(&self, data: &TrainingSet) -> Result<SimpleTrainingReport> {
        if data.n_features() != N_FEATURES {
            return Err(EnsembleError::ShapeError {
                expected: format!("{} canonical features", N_FEATURES),
                actual: format!("{} features", data.n_features()),
            });
        }

        let mut scaler = Scaler::standard();
        let scaled = TrainingSet {
            x: scaler.fit_transform(&data.x)?,
            ..data.clone()
        };
        let (train, test) = scaled.stratified_split(0.2, SEED)?;

        let mut model = Self::forest();
        model.fit(&train.x, &train.y)?;
        let y_pred = model.predict(&test.x)?;

        let report = SimpleTrainingReport {
            accuracy: accuracy(&test.y, &y_pred),
            classification_report: ClassificationReport::compute(&test.y, &y_pred),
            confusion_matrix: confusion_matrix(&test.y, &y_pred),
        };
        info!(accuracy = report.accuracy, "Random forest trained");

        fs::create_dir_all(&self.dir)?;
        write_json(&self.dir.join(MODEL_FILE), &model)?;
        write_json(&self.dir.join(SCALER_FILE), &scaler)?;

        *self.state.write() = Some(Arc::new(Fitted { model, scaler }));
        Ok(report)
    }

    /// Read both artifacts; returns whether a model is now available
    pub fn load(&self) -> bool {
        let model: Option<RandomForest> = read_json(&self.dir.join(MODEL_FILE));
        let scaler: Option<Scaler> = read_json(&self.dir.join(SCALER_FILE));
        match (model, scaler) {
            (Some(model), Some(scaler)) if model.is_fitted() => {
                *self.state.write() = Some(Arc::new(Fitted { model, scaler }));
                true
            }
            _ => false,
        }
    }

    fn fitted(&self) -> Result<Arc<Fitted>> {
        if let Some(fitted) = self.state.read().clone() {
            return Ok(fitted);
        }
        if !self.load() {
            warn!(dir = %self.dir.display(), "No trained random forest on disk");
        }
        self.state.read().clone().ok_or(EnsembleError::NotTrained)
    }

    pub fn predict(&self, features: &HashMap<String, f64>) -> Result<SimplePrediction> {
        let fitted = self.fitted()?;
        let vector = FeatureVector::from_map(features)?;
        let x = fitted
            .scaler
            .transform_row(vector.as_slice())?
            .insert_axis(ndarray::Axis(0));
        let proba = fitted.model.predict_proba(&x)?;

        let probabilities = ClassProbabilities {
            benign: proba[[0, 0]],
            malignant: proba[[0, 1]],
        };
        let prediction = probabilities.diagnosis();
        let confidence = probabilities.max();
        Ok(SimplePrediction {
            prediction,
            confidence,
            risk_level: RiskLevel::from_prediction(prediction, confidence),
            probabilities,
        })
    }

    /// Forest importances, most important first
    pub fn feature_importance(&self) -> Result<Vec<(String, f64)>> {
        let fitted = self.fitted()?;
        let importances = fitted
            .model
            .feature_importances()
            .ok_or(EnsembleError::ModelNotFitted)?;
        let mut ranked: Vec<(String, f64)> = FEATURE_NAMES
            .iter()
            .map(|n| n.to_string())
            .zip(importances.iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SyntheticGenerator;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("wisconsin_simple_{}_{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_untrained_predict_fails() {
        let predictor = SimplePredictor::new(temp_dir("untrained"));
        let features = FeatureVector::new([1.0; N_FEATURES]).to_map();
        assert!(matches!(predictor.predict(&features), Err(EnsembleError::NotTrained)));
        assert!(matches!(predictor.feature_importance(), Err(EnsembleError::NotTrained)));
    }

    #[test]
    fn test_train_predict_and_reload() {
        let dir = temp_dir("trained");
        let data = SyntheticGenerator::default().with_samples(200).generate().unwrap();
        let predictor = SimplePredictor::new(&dir);
        let report = predictor.train(&data).unwrap();
        assert!(report.accuracy > 0.85);
        let held_out = report.classification_report.benign.support + report.classification_report.malignant.support;
        assert!((38..=42).contains(&held_out));

        let row = data.x.row(0).to_vec();
        let features = FeatureVector::from_slice(&row).unwrap().to_map();
        let first = predictor.predict(&features).unwrap();
        assert!((first.probabilities.benign + first.probabilities.malignant - 1.0).abs() < 1e-9);

        // a fresh instance loads lazily from disk
        let reloaded = SimplePredictor::new(&dir);
        assert!(!reloaded.is_trained());
        let second = reloaded.predict(&features).unwrap();
        assert!(reloaded.is_trained());
        assert_eq!(first.prediction, second.prediction);
        assert!((first.confidence - second.confidence).abs() < 1e-12);

        let ranked = reloaded.feature_importance().unwrap();
        assert_eq!(ranked.len(), N_FEATURES);
        assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_feature_rejected() {
        let dir = temp_dir("missing");
        let data = SyntheticGenerator::default().with_samples(80).generate().unwrap();
        let predictor = SimplePredictor::new(&dir);
        predictor.train(&data).unwrap();
        let mut features = FeatureVector::new([1.0; N_FEATURES]).to_map();
        features.remove("area_mean");
        assert!(matches!(predictor.predict(&features), Err(EnsembleError::FeatureNotFound(_))));
        let _ = fs::remove_dir_all(&dir);
    }
}
