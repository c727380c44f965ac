//! Held-out evaluation and feature importance reporting

use super::bundle::EnsembleBundle;
use super::predictor::{self, labels};
use crate::data::TrainingSet;
use crate::error::{EnsembleError, Result};
use crate::features::catalog::{self, FeatureGroup};
use crate::training::{accuracy, confusion_matrix, roc_auc, ClassificationReport, Classifier};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub ensemble_accuracy: f64,
    /// 0.0 when the test set holds a single class
    pub ensemble_roc_auc: f64,
    pub confusion_matrix: [[usize; 2]; 2],
    pub classification_report: ClassificationReport,
    /// Held-out accuracy per member, 0.0 for members that failed
    pub individual_performance: BTreeMap<String, f64>,
    pub average_confidence: f64,
    pub average_uncertainty: f64,
    pub model_weights: BTreeMap<String, f64>,
    pub test_samples: usize,
}

/// Score the ensemble and each member on `test`
pub fn evaluate(bundle: &EnsembleBundle, test: &TrainingSet) -> Result<EvaluationReport> {
    if test.n_samples() == 0 {
        return Err(EnsembleError::DataError("empty evaluation set".to_string()));
    }

    let results = predictor::predict_batch(&test.x, bundle)?;
    let y_pred = labels(&results);
    let malignant: Array1<f64> = results.iter().map(|r| r.probabilities.malignant).collect();
    let n = results.len() as f64;

    let scaled = bundle.scaler.transform(&test.x)?;
    let individual_performance = bundle
        .members
        .iter()
        .map(|m| {
            let score = match m.model.predict(&scaled) {
                Ok(pred) => accuracy(&test.y, &pred),
                Err(e) => {
                    warn!(model = %m.name, error = %e, "Model evaluation failed");
                    0.0
                }
            };
            (m.name.clone(), score)
        })
        .collect();

    let report = EvaluationReport {
        ensemble_accuracy: accuracy(&test.y, &y_pred),
        ensemble_roc_auc: roc_auc(&test.y, &malignant).unwrap_or(0.0),
        confusion_matrix: confusion_matrix(&test.y, &y_pred),
        classification_report: ClassificationReport::compute(&test.y, &y_pred),
        individual_performance,
        average_confidence: results.iter().map(|r| r.confidence).sum::<f64>() / n,
        average_uncertainty: results.iter().map(|r| r.uncertainty).sum::<f64>() / n,
        model_weights: bundle.weights(),
        test_samples: test.n_samples(),
    };

    info!(
        accuracy = report.ensemble_accuracy,
        roc_auc = report.ensemble_roc_auc,
        samples = report.test_samples,
        "Ensemble evaluated"
    );
    Ok(report)
}

/// Mean importance per feature across members, split by statistic family
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupedImportance {
    pub mean_features: BTreeMap<String, f64>,
    pub se_features: BTreeMap<String, f64>,
    pub worst_features: BTreeMap<String, f64>,
    pub enhanced_features: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureImportanceReport {
    pub individual_model_importance: BTreeMap<String, BTreeMap<String, f64>>,
    pub grouped_importance: GroupedImportance,
    pub ensemble_weights: BTreeMap<String, f64>,
}

/// Collect importances from every member that exposes them.
///
/// Tree ensembles report impurity importances; linear models report absolute
/// coefficients. Members exposing neither are left out.
pub fn feature_importance(bundle: &EnsembleBundle) -> FeatureImportanceReport {
    let mut individual = BTreeMap::new();
    for member in &bundle.members {
        let values = member
            .model
            .feature_importances()
            .or_else(|| member.model.coefficients().map(|c| c.mapv(f64::abs)));
        if let Some(values) = values {
            let named: BTreeMap<String, f64> = bundle
                .feature_names
                .iter()
                .cloned()
                .zip(values.iter().copied())
                .collect();
            individual.insert(member.name.clone(), named);
        }
    }

    let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for importances in individual.values() {
        for (feature, value) in importances {
            let entry = sums.entry(feature.as_str()).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }

    let mut grouped = GroupedImportance::default();
    for (feature, (sum, count)) in sums {
        let target = match catalog::group_of(feature) {
            Some(FeatureGroup::Mean) => &mut grouped.mean_features,
            Some(FeatureGroup::Se) => &mut grouped.se_features,
            Some(FeatureGroup::Worst) => &mut grouped.worst_features,
            None => &mut grouped.enhanced_features,
        };
        target.insert(feature.to_string(), sum / count as f64);
    }

    FeatureImportanceReport {
        individual_model_importance: individual,
        grouped_importance: grouped,
        ensemble_weights: bundle.weights(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SyntheticGenerator;
    use crate::ensemble::bank::{ModelBank, LOGISTIC_REGRESSION, RANDOM_FOREST, SVM_RBF};
    use crate::ensemble::EnsembleTrainer;
    use crate::features::{enhance_matrix, N_ENHANCED};

    fn trained() -> (EnsembleBundle, TrainingSet) {
        let data = enhance_matrix(&SyntheticGenerator::default().with_samples(200).generate().unwrap()).unwrap();
        let (train, test) = data.stratified_split(0.25, 42).unwrap();
        let mut bank = ModelBank::quick();
        for name in ModelBank::quick().names() {
            if ![RANDOM_FOREST, SVM_RBF, LOGISTIC_REGRESSION].contains(&name) {
                bank.remove(name);
            }
        }
        let bundle = EnsembleTrainer::new(bank).train(&train).unwrap().bundle;
        (bundle, test)
    }

    #[test]
    fn test_evaluate_on_holdout() {
        let (bundle, test) = trained();
        let report = evaluate(&bundle, &test).unwrap();
        assert!(report.ensemble_accuracy > 0.85);
        assert!(report.ensemble_roc_auc > 0.9);
        assert_eq!(report.individual_performance.len(), 3);
        let cm = report.confusion_matrix;
        assert_eq!(cm[0][0] + cm[0][1] + cm[1][0] + cm[1][1], test.n_samples());
        assert!(report.average_confidence >= 0.5 && report.average_confidence <= 1.0);
        assert!(report.average_uncertainty >= 0.0 && report.average_uncertainty <= 1.0);
    }

    #[test]
    fn test_importance_groups() {
        let (bundle, _) = trained();
        let report = feature_importance(&bundle);
        // the rbf svm exposes neither importances nor coefficients
        assert!(report.individual_model_importance.contains_key(RANDOM_FOREST));
        assert!(report.individual_model_importance.contains_key(LOGISTIC_REGRESSION));
        assert!(!report.individual_model_importance.contains_key(SVM_RBF));

        let g = &report.grouped_importance;
        assert_eq!(g.mean_features.len(), 10);
        assert_eq!(g.se_features.len(), 10);
        assert_eq!(g.worst_features.len(), 10);
        assert_eq!(g.enhanced_features.len(), N_ENHANCED - 30);
        assert!(g.enhanced_features.contains_key("area_perimeter_ratio"));
    }
}
