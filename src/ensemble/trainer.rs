//! Ensemble training
//!
//! Scale once, fit every bank member in parallel, score the survivors on one
//! shared set of stratified folds and weight them by mean CV accuracy.

use super::bank::{ClassifierModel, ModelBank};
use super::bundle::{EnsembleBundle, EnsembleMember, ModelPerformance};
use super::tuning::{self, TuningResult};
use crate::data::{DataSource, TrainingSet};
use crate::error::{EnsembleError, Result};
use crate::preprocessing::Scaler;
use crate::training::{CVSplit, Classifier, CrossValidator};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{info, warn};

/// Trained bundle plus what went into it
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub bundle: EnsembleBundle,
    pub data_source: DataSource,
    pub training_samples: usize,
}

/// Serializable view of a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub trained_models: usize,
    pub model_performance: BTreeMap<String, ModelPerformance>,
    pub ensemble_weights: BTreeMap<String, f64>,
    pub failed_models: BTreeMap<String, String>,
    pub data_source: DataSource,
    pub training_samples: usize,
}

impl TrainingOutcome {
    pub fn summary(&self) -> TrainingSummary {
        TrainingSummary {
            trained_models: self.bundle.model_count(),
            model_performance: self.bundle.performance(),
            ensemble_weights: self.bundle.weights(),
            failed_models: self.bundle.failed_models.clone(),
            data_source: self.data_source,
            training_samples: self.training_samples,
        }
    }
}

/// Fits a [`ModelBank`] into an [`EnsembleBundle`]
#[derive(Debug, Clone, Default)]
pub struct EnsembleTrainer {
    bank: ModelBank,
    cv: CrossValidator,
}

impl EnsembleTrainer {
    pub fn new(bank: ModelBank) -> Self {
        Self {
            bank,
            cv: CrossValidator::default(),
        }
    }

    pub fn with_cross_validator(mut self, cv: CrossValidator) -> Self {
        self.cv = cv;
        self
    }

    pub fn bank(&self) -> &ModelBank {
        &self.bank
    }

    /// Grid-search one member and keep the winning configuration
    pub fn tune(&mut self, name: &str, data: &TrainingSet) -> Result<TuningResult> {
        tuning::tune(&mut self.bank, name, data)
    }

    pub fn train(&self, data: &TrainingSet) -> Result<TrainingOutcome> {
        let start = Instant::now();
        info!(
            samples = data.n_samples(),
            features = data.n_features(),
            models = self.bank.len(),
            "Training ensemble"
        );

        let mut scaler = Scaler::robust();
        let x = scaler.fit_transform(&data.x)?;
        let splits = self.cv.split(&data.y)?;

        let results: Vec<(String, Result<(ClassifierModel, ModelPerformance)>)> = self
            .bank
            .iter()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|(name, model)| (name.to_string(), fit_and_score(model, &x, &data.y, &splits)))
            .collect();

        let mut members = Vec::new();
        let mut failed_models = BTreeMap::new();
        for (name, result) in results {
            match result {
                Ok((model, performance)) => {
                    info!(
                        model = %name,
                        accuracy = performance.mean_accuracy,
                        std = performance.std_accuracy,
                        "Model trained"
                    );
                    members.push(EnsembleMember {
                        name,
                        model,
                        weight: performance.mean_accuracy,
                        performance,
                    });
                }
                Err(e) => {
                    warn!(model = %name, error = %e, "Model failed to train");
                    failed_models.insert(name, e.to_string());
                }
            }
        }

        if members.is_empty() {
            return Err(EnsembleError::NoModelsTrained {
                failures: failed_models.into_iter().collect(),
            });
        }

        let bundle = EnsembleBundle::new(scaler, members, data.feature_names.clone(), failed_models);
        info!(
            trained = bundle.model_count(),
            failed = bundle.failed_models.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Ensemble training finished"
        );

        Ok(TrainingOutcome {
            bundle,
            data_source: data.source,
            training_samples: data.n_samples(),
        })
    }
}

fn fit_and_score(
    prototype: &ClassifierModel,
    x: &Array2<f64>,
    y: &Array1<f64>,
    splits: &[CVSplit],
) -> Result<(ClassifierModel, ModelPerformance)> {
    let mut model = prototype.clone();
    model.fit(x, y)?;
    let performance = CrossValidator::score_splits(splits, prototype, x, y)?.into();
    Ok((model, performance))
}
