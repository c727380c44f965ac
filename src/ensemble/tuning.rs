//! Exhaustive grid search over bank members
//!
//! Every candidate is scored with 5-fold stratified cross-validation on
//! robust-scaled features; the best configuration replaces the bank entry.

use super::bank::{ClassifierModel, ModelBank, GRADIENT_BOOSTING, NEURAL_NETWORK, RANDOM_FOREST, SVM_RBF};
use crate::data::TrainingSet;
use crate::error::{EnsembleError, Result};
use crate::preprocessing::Scaler;
use crate::training::{CrossValidator, Gamma, KernelType, SVMClassifier};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;

/// One grid point and its cross-validated accuracy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningCandidate {
    pub params: Map<String, Value>,
    pub mean_score: f64,
    pub std_score: f64,
}

/// Outcome of a grid search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningResult {
    pub model_name: String,
    pub best_params: Map<String, Value>,
    pub best_score: f64,
    pub candidates: Vec<TuningCandidate>,
}

type Grid = Vec<(Map<String, Value>, ClassifierModel)>;

fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Models that have a parameter grid
pub const TUNABLE_MODELS: [&str; 4] = [RANDOM_FOREST, GRADIENT_BOOSTING, SVM_RBF, NEURAL_NETWORK];

/// Expand the grid for `name` around the bank's current configuration
fn parameter_grid(name: &str, base: &ClassifierModel) -> Option<Grid> {
    let mut grid = Grid::new();
    match (name, base) {
        (RANDOM_FOREST, ClassifierModel::RandomForest(rf)) => {
            for n_estimators in [100, 200, 300] {
                for max_depth in [Some(10), Some(12), Some(15), None] {
                    for min_samples_split in [2, 3, 5] {
                        for min_samples_leaf in [1, 2, 4] {
                            let mut m = rf.clone();
                            m.n_estimators = n_estimators;
                            m.max_depth = max_depth;
                            m.min_samples_split = min_samples_split;
                            m.min_samples_leaf = min_samples_leaf;
                            grid.push((
                                params(json!({
                                    "n_estimators": n_estimators,
                                    "max_depth": max_depth,
                                    "min_samples_split": min_samples_split,
                                    "min_samples_leaf": min_samples_leaf,
                                })),
                                m.into(),
                            ));
                        }
                    }
                }
            }
        }
        (GRADIENT_BOOSTING, ClassifierModel::GradientBoosting(gb)) => {
            for n_estimators in [100, 200, 300] {
                for learning_rate in [0.05, 0.1, 0.15] {
                    for max_depth in [4, 6, 8] {
                        for min_samples_split in [2, 3, 5] {
                            let mut m = gb.clone();
                            m.config.n_estimators = n_estimators;
                            m.config.learning_rate = learning_rate;
                            m.config.max_depth = max_depth;
                            m.config.min_samples_split = min_samples_split;
                            grid.push((
                                params(json!({
                                    "n_estimators": n_estimators,
                                    "learning_rate": learning_rate,
                                    "max_depth": max_depth,
                                    "min_samples_split": min_samples_split,
                                })),
                                m.into(),
                            ));
                        }
                    }
                }
            }
        }
        (SVM_RBF, ClassifierModel::Svm(svm)) => {
            let gammas = [
                (Gamma::Scale, json!("scale")),
                (Gamma::Auto, json!("auto")),
                (Gamma::Value(0.001), json!(0.001)),
                (Gamma::Value(0.01), json!(0.01)),
                (Gamma::Value(0.1), json!(0.1)),
                (Gamma::Value(1.0), json!(1.0)),
            ];
            for c in [0.1, 1.0, 10.0, 100.0] {
                for (gamma, label) in &gammas {
                    let mut config = svm.config.clone();
                    config.c = c;
                    config.kernel = KernelType::Rbf { gamma: *gamma };
                    grid.push((params(json!({ "C": c, "gamma": label })), SVMClassifier::new(config).into()));
                }
            }
        }
        (NEURAL_NETWORK, ClassifierModel::NeuralNetwork(mlp)) => {
            let layers: [&[usize]; 4] = [&[50], &[100], &[100, 50], &[100, 50, 25]];
            for hidden in layers {
                for alpha in [0.0001, 0.001, 0.01] {
                    for adaptive in [false, true] {
                        let schedule = if adaptive { "adaptive" } else { "constant" };
                        let mut m = mlp.clone();
                        m.config.hidden_layers = hidden.to_vec();
                        m.config.alpha = alpha;
                        m.config.adaptive_learning_rate = adaptive;
                        grid.push((
                            params(json!({
                                "hidden_layer_sizes": hidden,
                                "alpha": alpha,
                                "learning_rate": schedule,
                            })),
                            m.into(),
                        ));
                    }
                }
            }
        }
        _ => return None,
    }
    Some(grid)
}

/// Grid-search `name` on `data` and store the winner back into `bank`
pub fn tune(bank: &mut ModelBank, name: &str, data: &TrainingSet) -> Result<TuningResult> {
    let base = bank
        .get(name)
        .ok_or_else(|| EnsembleError::UnknownModel(name.to_string()))?;
    let grid = parameter_grid(name, base).ok_or_else(|| EnsembleError::NoParameterGrid(name.to_string()))?;

    info!(model = %name, candidates = grid.len(), "Starting hyperparameter search");

    let x = Scaler::robust().fit_transform(&data.x)?;
    let cv = CrossValidator::default();

    let scored: Vec<(TuningCandidate, ClassifierModel)> = grid
        .into_par_iter()
        .map(|(params, model)| {
            let results = cv.cross_val_score(&model, &x, &data.y)?;
            Ok((
                TuningCandidate {
                    params,
                    mean_score: results.mean_score,
                    std_score: results.std_score,
                },
                model,
            ))
        })
        .collect::<Result<_>>()?;

    // first maximum wins ties
    let best_idx = scored
        .iter()
        .enumerate()
        .fold(0, |best, (i, (c, _))| if c.mean_score > scored[best].0.mean_score { i } else { best });
    let (best, best_model) = scored[best_idx].clone();

    info!(model = %name, best_score = best.mean_score, "Hyperparameter search finished");

    bank.set(name, best_model);
    Ok(TuningResult {
        model_name: name.to_string(),
        best_params: best.params,
        best_score: best.mean_score,
        candidates: scored.into_iter().map(|(c, _)| c).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SyntheticGenerator;
    use crate::ensemble::bank::{LOGISTIC_REGRESSION, SVM_LINEAR};
    use crate::training::Classifier;

    #[test]
    fn test_grid_sizes() {
        let bank = ModelBank::quick();
        let size = |name: &str| parameter_grid(name, bank.get(name).unwrap()).map(|g| g.len());
        assert_eq!(size(RANDOM_FOREST), Some(108));
        assert_eq!(size(GRADIENT_BOOSTING), Some(81));
        assert_eq!(size(SVM_RBF), Some(24));
        assert_eq!(size(NEURAL_NETWORK), Some(24));
        assert_eq!(size(SVM_LINEAR), None);
    }

    #[test]
    fn test_unknown_and_gridless_names() {
        let data = SyntheticGenerator::default().with_samples(40).generate().unwrap();
        let mut bank = ModelBank::quick();
        assert!(matches!(
            tune(&mut bank, "gaussian_process", &data),
            Err(EnsembleError::UnknownModel(name)) if name == "gaussian_process"
        ));
        assert!(matches!(
            tune(&mut bank, LOGISTIC_REGRESSION, &data),
            Err(EnsembleError::NoParameterGrid(_))
        ));
    }

    #[test]
    fn test_svm_search_updates_bank() {
        let data = SyntheticGenerator::default().with_samples(80).generate().unwrap();
        let mut bank = ModelBank::quick();
        let result = tune(&mut bank, SVM_RBF, &data).unwrap();
        assert_eq!(result.candidates.len(), 24);
        assert!(result.best_score > 0.5);
        assert!(result.candidates.iter().all(|c| c.mean_score <= result.best_score));

        let c = result.best_params["C"].as_f64().unwrap();
        match bank.get(SVM_RBF) {
            Some(ClassifierModel::Svm(svm)) => {
                assert_eq!(svm.config.c, c);
                assert!(!svm.is_fitted());
            }
            _ => panic!("svm_rbf entry missing"),
        }
    }
}
