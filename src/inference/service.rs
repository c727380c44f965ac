//! Long-lived prediction service
//!
//! Holds the current ensemble behind an `RwLock<Option<Arc<_>>>`. Readers
//! clone the `Arc` and drop the lock before predicting; retraining replaces
//! the whole bundle in one write.

use super::simple::SimplePredictor;
use crate::config::EngineConfig;
use crate::data::{DataSource, DatasetProvider, DatasetStatistics, TrainingSet};
use crate::ensemble::bank::{GRADIENT_BOOSTING, RANDOM_FOREST, SVM_RBF};
use crate::ensemble::{
    self, evaluate, feature_importance, ClassProbabilities, Diagnosis, EnsembleBundle, EnsembleTrainer,
    EvaluationReport, FeatureImportanceReport, IndividualPrediction, ModelBank, ModelPerformance,
    PredictionResult, RiskLevel, TrainingSummary, TuningResult,
};
use crate::error::{EnsembleError, Result};
use crate::features::{enhance, validate_all, FeatureVector, ValidationResult, N_FEATURES};
use crate::store::{LoadOutcome, ModelStore};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Models grid-searched when tuning is requested
pub const TUNED_MODELS: [&str; 3] = [RANDOM_FOREST, GRADIENT_BOOSTING, SVM_RBF];

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainOptions {
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub tuning: bool,
    #[serde(default)]
    pub test_size: Option<f64>,
    /// Reduced model sizes
    #[serde(default)]
    pub quick: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub total_samples: usize,
    pub training_samples: usize,
    pub test_samples: usize,
    pub features_used: usize,
    pub enhanced_features: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub summary: TrainingSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<EvaluationReport>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tuning: Vec<TuningResult>,
    pub dataset_info: DatasetInfo,
    pub trained_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub features: HashMap<String, f64>,
    #[serde(default = "default_true")]
    pub include_uncertainty: bool,
    #[serde(default, alias = "return_individual_predictions")]
    pub return_individual: bool,
}

impl PredictRequest {
    pub fn new(features: HashMap<String, f64>) -> Self {
        Self {
            features,
            include_uncertainty: true,
            return_individual: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: Diagnosis,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub uncertainty: Option<f64>,
    pub risk_level: RiskLevel,
    pub probabilities: ClassProbabilities,
    pub feature_validation: BTreeMap<String, ValidationResult>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub individual_predictions: Option<BTreeMap<String, IndividualPrediction>>,
    pub failed_models: Vec<String>,
}

impl PredictResponse {
    fn new(result: PredictionResult, include_uncertainty: bool, feature_validation: BTreeMap<String, ValidationResult>) -> Self {
        Self {
            prediction: result.prediction,
            confidence: result.confidence,
            uncertainty: include_uncertainty.then_some(result.uncertainty),
            risk_level: result.risk_level,
            probabilities: result.probabilities,
            feature_validation,
            individual_predictions: result.individual_predictions,
            failed_models: result.failed_models,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleStatus {
    pub models_loaded: bool,
    pub trained_models: Vec<String>,
    pub model_count: usize,
    pub ensemble_weights: BTreeMap<String, f64>,
    pub model_performance: BTreeMap<String, ModelPerformance>,
    pub failed_models: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trained_at: Option<DateTime<Utc>>,
}

/// Process-wide owner of the trained ensemble and the simple predictor
#[derive(Debug)]
pub struct PredictionService {
    config: EngineConfig,
    store: ModelStore,
    bundle: RwLock<Option<Arc<EnsembleBundle>>>,
    simple: SimplePredictor,
}

impl PredictionService {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            store: ModelStore::new(&config.models_dir),
            simple: SimplePredictor::new(&config.models_dir),
            bundle: RwLock::new(None),
            config,
        }
    }

    /// Construct and try to pick up a persisted ensemble
    pub fn open(config: EngineConfig) -> Result<Self> {
        let service = Self::new(config);
        let outcome = service.load()?;
        if outcome.loaded {
            info!(
                loaded = outcome.loaded_count,
                expected = outcome.expected_count,
                "Ensemble restored from disk"
            );
        } else {
            info!(dir = %service.store.dir().display(), "No persisted ensemble found");
        }
        Ok(service)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn simple(&self) -> &SimplePredictor {
        &self.simple
    }

    /// Re-read the store; the current bundle is replaced only when one loads
    pub fn load(&self) -> Result<LoadOutcome> {
        let outcome = self.store.load()?;
        if let Some(bundle) = &outcome.bundle {
            self.install(bundle.clone());
        }
        Ok(outcome)
    }

    pub fn install(&self, bundle: EnsembleBundle) {
        *self.bundle.write() = Some(Arc::new(bundle));
    }

    pub fn bundle(&self) -> Option<Arc<EnsembleBundle>> {
        self.bundle.read().clone()
    }

    /// The current bundle, falling back to one read from the store.
    ///
    /// A lazily loaded bundle is installed only into an empty slot, so a
    /// training run that finishes meanwhile is never replaced.
    fn require_bundle(&self) -> Result<Arc<EnsembleBundle>> {
        if let Some(bundle) = self.bundle() {
            return Ok(bundle);
        }
        let outcome = self.store.load()?;
        self.install_if_empty(outcome.bundle).ok_or(EnsembleError::NotTrained)
    }

    /// Fill an empty slot; an occupied one wins and is returned
    fn install_if_empty(&self, bundle: Option<EnsembleBundle>) -> Option<Arc<EnsembleBundle>> {
        let mut slot = self.bundle.write();
        if slot.is_none() {
            *slot = bundle.map(Arc::new);
        }
        slot.clone()
    }

    pub fn is_trained(&self) -> bool {
        self.bundle.read().is_some()
    }

    pub fn status(&self) -> EnsembleStatus {
        match self.require_bundle().ok() {
            Some(b) => EnsembleStatus {
                models_loaded: true,
                trained_models: b.model_names(),
                model_count: b.model_count(),
                ensemble_weights: b.weights(),
                model_performance: b.performance(),
                failed_models: b.failed_models.clone(),
                trained_at: Some(b.trained_at),
            },
            None => EnsembleStatus {
                models_loaded: false,
                trained_models: Vec::new(),
                model_count: 0,
                ensemble_weights: BTreeMap::new(),
                model_performance: BTreeMap::new(),
                failed_models: BTreeMap::new(),
                trained_at: None,
            },
        }
    }

    /// Validate, enhance and predict one name-keyed sample.
    ///
    /// Validation is advisory: out-of-range values are reported next to the
    /// prediction, never rejected. A missing canonical feature is an error.
    pub fn predict(&self, request: &PredictRequest) -> Result<PredictResponse> {
        let bundle = self.require_bundle()?;
        let feature_validation = validate_all(&request.features);
        let invalid = feature_validation.values().filter(|v| !v.valid).count();
        if invalid > 0 {
            warn!(invalid, "Prediction input outside reference ranges");
        }

        let vector = FeatureVector::from_map(&request.features)?;
        let enhanced = enhance(&vector);
        let features = if bundle.n_features() == N_FEATURES {
            vector.as_slice()
        } else {
            enhanced.as_slice()
        };

        if let Some(i) = features.iter().position(|v| !v.is_finite()) {
            let name = bundle.feature_names.get(i).cloned().unwrap_or_else(|| format!("feature {}", i));
            return Err(EnsembleError::InvalidParameter {
                name,
                value: features[i].to_string(),
                reason: "not finite; a ratio denominator in the input is zero".to_string(),
            });
        }

        let result = ensemble::predict(features, &bundle, request.return_individual)?;
        Ok(PredictResponse::new(result, request.include_uncertainty, feature_validation))
    }

    /// Summaries of the reference dataset as currently retrievable
    pub async fn dataset_statistics(&self) -> Result<DatasetStatistics> {
        let data = DatasetProvider::from_config(&self.config).fetch().await?;
        Ok(DatasetStatistics::compute(&data))
    }

    pub fn feature_importance(&self) -> Result<FeatureImportanceReport> {
        let bundle = self.require_bundle()?;
        Ok(feature_importance(&bundle))
    }

    /// Fetch the reference dataset and train on it.
    ///
    /// Training itself is CPU-bound and runs on the blocking pool.
    pub async fn train(self: &Arc<Self>, options: TrainOptions) -> Result<TrainResponse> {
        let data = DatasetProvider::from_config(&self.config).fetch().await?;
        let service = Arc::clone(self);
        tokio::task::spawn_blocking(move || service.train_on(&data, &options))
            .await
            .map_err(|e| EnsembleError::TrainingError(format!("training task failed: {}", e)))?
    }

    /// Enhance, split, optionally tune, train, evaluate, persist and swap in
    pub fn train_on(&self, data: &TrainingSet, options: &TrainOptions) -> Result<TrainResponse> {
        let test_size = options.test_size.unwrap_or(self.config.test_size);
        let enhanced = crate::features::enhance_matrix(data)?;
        let (train, test) = enhanced.stratified_split(test_size, self.config.random_state)?;

        let bank = if options.quick { ModelBank::quick() } else { ModelBank::default() };
        let mut trainer = EnsembleTrainer::new(bank);

        let mut tuning = Vec::new();
        if options.tuning {
            for name in TUNED_MODELS {
                match trainer.tune(name, &train) {
                    Ok(result) => tuning.push(result),
                    Err(e) => warn!(model = %name, error = %e, "Hyperparameter search failed"),
                }
            }
        }

        let outcome = trainer.train(&train)?;
        let evaluation = match evaluate(&outcome.bundle, &test) {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, "Evaluation failed");
                None
            }
        };

        let store = match &options.output_dir {
            Some(dir) => ModelStore::new(dir),
            None => self.store.clone(),
        };
        store.save(&outcome.bundle)?;

        let summary = outcome.summary();
        let trained_at = outcome.bundle.trained_at;
        let response = TrainResponse {
            success: true,
            message: format!(
                "Ensemble trained with {} models on {} data",
                summary.trained_models,
                match data.source {
                    DataSource::Remote => "reference",
                    DataSource::Synthetic => "synthetic",
                }
            ),
            summary,
            evaluation,
            tuning,
            dataset_info: DatasetInfo {
                total_samples: data.n_samples(),
                training_samples: train.n_samples(),
                test_samples: test.n_samples(),
                features_used: enhanced.n_features(),
                enhanced_features: enhanced.n_features() - data.n_features(),
            },
            trained_at,
        };

        self.install(outcome.bundle);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SyntheticGenerator;
    use crate::features::catalog::CATALOG;

    fn config(tag: &str) -> EngineConfig {
        let dir = std::env::temp_dir().join(format!("wisconsin_service_{}_{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        EngineConfig::default().with_models_dir(dir)
    }

    fn typical_features() -> HashMap<String, f64> {
        CATALOG
            .iter()
            .map(|s| (s.name.to_string(), (s.typical.0 + s.typical.1) / 2.0))
            .collect()
    }

    #[test]
    fn test_predict_before_training() {
        let service = PredictionService::new(config("untrained"));
        assert!(!service.status().models_loaded);
        let err = service.predict(&PredictRequest::new(typical_features())).unwrap_err();
        assert!(matches!(err, EnsembleError::NotTrained));
    }

    #[test]
    fn test_train_predict_reopen() {
        let config = config("trained");
        let service = PredictionService::new(config.clone());
        let data = SyntheticGenerator::default().with_samples(150).generate().unwrap();
        let response = service
            .train_on(
                &data,
                &TrainOptions {
                    quick: true,
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(response.success);
        assert_eq!(response.dataset_info.features_used, 40);
        assert_eq!(response.dataset_info.enhanced_features, 10);
        assert_eq!(response.summary.trained_models + response.summary.failed_models.len(), 8);
        assert!(response.evaluation.is_some());

        let mut features = typical_features();
        features.insert("radius_mean".into(), 1000.0);
        let request = PredictRequest {
            return_individual: true,
            ..PredictRequest::new(features.clone())
        };
        let out = service.predict(&request).unwrap();
        assert!(!out.feature_validation["radius_mean"].valid);
        assert!(out.feature_validation["texture_mean"].valid);
        assert!(matches!(out.prediction, Diagnosis::Benign | Diagnosis::Malignant));
        assert!(out.individual_predictions.is_some());

        let reopened = PredictionService::open(config.clone()).unwrap();
        assert_eq!(reopened.status().model_count, service.status().model_count);
        let again = reopened.predict(&PredictRequest::new(features)).unwrap();
        assert!((again.confidence - out.confidence).abs() < 1e-9);
        let _ = std::fs::remove_dir_all(&config.models_dir);
    }

    #[test]
    fn test_zero_denominator_is_rejected() {
        let config = config("zero_denominator");
        let service = PredictionService::new(config.clone());
        let data = SyntheticGenerator::default().with_samples(150).generate().unwrap();
        service
            .train_on(&data, &TrainOptions { quick: true, ..Default::default() })
            .unwrap();

        let mut features = typical_features();
        features.insert("compactness_mean".into(), 0.0);
        let err = service.predict(&PredictRequest::new(features.clone())).unwrap_err();
        assert!(matches!(err, EnsembleError::InvalidParameter { ref name, .. } if name.ends_with("_ratio")));

        features.insert("concavity_mean".into(), 0.0);
        assert!(matches!(
            service.predict(&PredictRequest::new(features)),
            Err(EnsembleError::InvalidParameter { .. })
        ));
        let _ = std::fs::remove_dir_all(&config.models_dir);
    }

    #[test]
    fn test_lazy_load_keeps_installed_bundle() {
        let config = config("lazy_race");
        let data = SyntheticGenerator::default().with_samples(100).generate().unwrap();
        let trained = PredictionService::new(config.clone());
        trained
            .train_on(&data, &TrainOptions { quick: true, ..Default::default() })
            .unwrap();
        let persisted = trained.bundle().unwrap();

        // a newer single-member generation lands before the lazy load installs
        let service = PredictionService::new(config.clone());
        let mut newer = persisted.members.clone();
        newer.truncate(1);
        service.install(EnsembleBundle::new(
            persisted.scaler.clone(),
            newer,
            persisted.feature_names.clone(),
            BTreeMap::new(),
        ));

        let from_store = ModelStore::new(&config.models_dir).load().unwrap().bundle;
        assert!(from_store.is_some());
        let kept = service.install_if_empty(from_store).unwrap();
        assert_eq!(kept.model_count(), 1);
        assert_eq!(service.status().model_count, 1);

        let empty = PredictionService::new(config.clone());
        let loaded = empty.install_if_empty(ModelStore::new(&config.models_dir).load().unwrap().bundle);
        assert_eq!(loaded.unwrap().model_count(), persisted.model_count());
        let _ = std::fs::remove_dir_all(&config.models_dir);
    }

    #[test]
    fn test_missing_feature_is_rejected() {
        let config = config("missing");
        let service = PredictionService::new(config.clone());
        let data = SyntheticGenerator::default().with_samples(100).generate().unwrap();
        service
            .train_on(&data, &TrainOptions { quick: true, ..Default::default() })
            .unwrap();
        let mut features = typical_features();
        features.remove("symmetry_se");
        let err = service.predict(&PredictRequest::new(features)).unwrap_err();
        assert!(matches!(err, EnsembleError::FeatureNotFound(name) if name == "symmetry_se"));
        let _ = std::fs::remove_dir_all(&config.models_dir);
    }
}
