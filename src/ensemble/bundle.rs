//! Trained ensemble state

use super::bank::ClassifierModel;
use crate::preprocessing::Scaler;
use crate::training::CVResults;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cross-validated accuracy of one member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPerformance {
    pub mean_accuracy: f64,
    pub std_accuracy: f64,
    pub cv_scores: Vec<f64>,
}

impl From<CVResults> for ModelPerformance {
    fn from(r: CVResults) -> Self {
        Self {
            mean_accuracy: r.mean_score,
            std_accuracy: r.std_score,
            cv_scores: r.scores,
        }
    }
}

/// A fitted model with its vote weight
#[derive(Debug, Clone)]
pub struct EnsembleMember {
    pub name: String,
    pub model: ClassifierModel,
    pub weight: f64,
    pub performance: ModelPerformance,
}

/// Everything needed to predict: the fitted scaler, the fitted members in
/// bank order and their weights. Never mutated once shared.
#[derive(Debug, Clone)]
pub struct EnsembleBundle {
    pub scaler: Scaler,
    pub members: Vec<EnsembleMember>,
    pub feature_names: Vec<String>,
    pub trained_at: DateTime<Utc>,
    /// Models that failed to train, with the cause
    pub failed_models: BTreeMap<String, String>,
}

impl EnsembleBundle {
    /// Assemble a bundle; weights are normalized to sum to 1
    pub fn new(
        scaler: Scaler,
        members: Vec<EnsembleMember>,
        feature_names: Vec<String>,
        failed_models: BTreeMap<String, String>,
    ) -> Self {
        let mut bundle = Self {
            scaler,
            members,
            feature_names,
            trained_at: Utc::now(),
            failed_models,
        };
        bundle.normalize_weights();
        bundle
    }

    pub fn with_trained_at(mut self, trained_at: DateTime<Utc>) -> Self {
        self.trained_at = trained_at;
        self
    }

    /// Rescale weights to sum to 1, falling back to uniform when they sum to 0
    pub(crate) fn normalize_weights(&mut self) {
        let total: f64 = self.members.iter().map(|m| m.weight).sum();
        let n = self.members.len() as f64;
        for member in &mut self.members {
            member.weight = if total > 0.0 { member.weight / total } else { 1.0 / n };
        }
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn model_count(&self) -> usize {
        self.members.len()
    }

    pub fn model_names(&self) -> Vec<String> {
        self.members.iter().map(|m| m.name.clone()).collect()
    }

    pub fn member(&self, name: &str) -> Option<&EnsembleMember> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn weights(&self) -> BTreeMap<String, f64> {
        self.members.iter().map(|m| (m.name.clone(), m.weight)).collect()
    }

    pub fn performance(&self) -> BTreeMap<String, ModelPerformance> {
        self.members
            .iter()
            .map(|m| (m.name.clone(), m.performance.clone()))
            .collect()
    }
}
