//! Heterogeneous model bank
//!
//! [`ClassifierModel`] is a closed set of the algorithms the ensemble knows
//! how to train and persist. [`ModelBank`] holds the named, pre-configured
//! instances in a fixed order.

use crate::error::Result;
use crate::training::{
    AdaBoostClassifier, Activation, Classifier, ExtraTrees, Gamma, GradientBoostingClassifier,
    GradientBoostingConfig, LogisticRegression, MLPClassifier, MLPConfig, MaxFeatures, RandomForest,
    SVMClassifier, SVMConfig,
};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

pub const RANDOM_FOREST: &str = "random_forest";
pub const GRADIENT_BOOSTING: &str = "gradient_boosting";
pub const EXTRA_TREES: &str = "extra_trees";
pub const SVM_RBF: &str = "svm_rbf";
pub const SVM_LINEAR: &str = "svm_linear";
pub const NEURAL_NETWORK: &str = "neural_network";
pub const LOGISTIC_REGRESSION: &str = "logistic_regression";
pub const ADA_BOOST: &str = "ada_boost";

/// Bank members in training and reporting order
pub const MODEL_NAMES: [&str; 8] = [
    RANDOM_FOREST,
    GRADIENT_BOOSTING,
    EXTRA_TREES,
    SVM_RBF,
    SVM_LINEAR,
    NEURAL_NETWORK,
    LOGISTIC_REGRESSION,
    ADA_BOOST,
];

const SEED: u64 = 42;

/// Any classifier the ensemble can hold
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "algorithm", content = "model", rename_all = "snake_case")]
pub enum ClassifierModel {
    RandomForest(RandomForest),
    GradientBoosting(GradientBoostingClassifier),
    ExtraTrees(ExtraTrees),
    Svm(SVMClassifier),
    NeuralNetwork(MLPClassifier),
    LogisticRegression(LogisticRegression),
    AdaBoost(AdaBoostClassifier),
}

macro_rules! dispatch {
    ($self:expr, $model:ident => $body:expr) => {
        match $self {
            ClassifierModel::RandomForest($model) => $body,
            ClassifierModel::GradientBoosting($model) => $body,
            ClassifierModel::ExtraTrees($model) => $body,
            ClassifierModel::Svm($model) => $body,
            ClassifierModel::NeuralNetwork($model) => $body,
            ClassifierModel::LogisticRegression($model) => $body,
            ClassifierModel::AdaBoost($model) => $body,
        }
    };
}

impl ClassifierModel {
    /// Short algorithm label for reports
    pub fn algorithm(&self) -> &'static str {
        match self {
            ClassifierModel::RandomForest(_) => "random_forest",
            ClassifierModel::GradientBoosting(_) => "gradient_boosting",
            ClassifierModel::ExtraTrees(_) => "extra_trees",
            ClassifierModel::Svm(_) => "svm",
            ClassifierModel::NeuralNetwork(_) => "mlp",
            ClassifierModel::LogisticRegression(_) => "logistic_regression",
            ClassifierModel::AdaBoost(_) => "ada_boost",
        }
    }
}

impl Classifier for ClassifierModel {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        dispatch!(self, m => m.fit(x, y))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        dispatch!(self, m => m.predict_proba(x))
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        dispatch!(self, m => m.predict(x))
    }

    fn is_fitted(&self) -> bool {
        dispatch!(self, m => m.is_fitted())
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        dispatch!(self, m => m.feature_importances())
    }

    fn coefficients(&self) -> Option<Array1<f64>> {
        dispatch!(self, m => m.coefficients())
    }
}

impl From<RandomForest> for ClassifierModel {
    fn from(m: RandomForest) -> Self {
        ClassifierModel::RandomForest(m)
    }
}

impl From<GradientBoostingClassifier> for ClassifierModel {
    fn from(m: GradientBoostingClassifier) -> Self {
        ClassifierModel::GradientBoosting(m)
    }
}

impl From<ExtraTrees> for ClassifierModel {
    fn from(m: ExtraTrees) -> Self {
        ClassifierModel::ExtraTrees(m)
    }
}

impl From<SVMClassifier> for ClassifierModel {
    fn from(m: SVMClassifier) -> Self {
        ClassifierModel::Svm(m)
    }
}

impl From<MLPClassifier> for ClassifierModel {
    fn from(m: MLPClassifier) -> Self {
        ClassifierModel::NeuralNetwork(m)
    }
}

impl From<LogisticRegression> for ClassifierModel {
    fn from(m: LogisticRegression) -> Self {
        ClassifierModel::LogisticRegression(m)
    }
}

impl From<AdaBoostClassifier> for ClassifierModel {
    fn from(m: AdaBoostClassifier) -> Self {
        ClassifierModel::AdaBoost(m)
    }
}

/// Named, ordered model configurations
#[derive(Debug, Clone)]
pub struct ModelBank {
    entries: Vec<(String, ClassifierModel)>,
}

impl Default for ModelBank {
    /// Full-size configurations
    fn default() -> Self {
        Self::from_entries(vec![
            (
                RANDOM_FOREST,
                RandomForest::new(200)
                    .with_max_depth(Some(12))
                    .with_min_samples_split(3)
                    .with_min_samples_leaf(1)
                    .with_max_features(MaxFeatures::Sqrt)
                    .with_random_state(SEED)
                    .into(),
            ),
            (
                GRADIENT_BOOSTING,
                GradientBoostingClassifier::new(GradientBoostingConfig {
                    n_estimators: 200,
                    learning_rate: 0.1,
                    max_depth: 6,
                    min_samples_split: 3,
                    min_samples_leaf: 1,
                    subsample: 0.8,
                    random_state: SEED,
                })
                .into(),
            ),
            (
                EXTRA_TREES,
                ExtraTrees::new(200)
                    .with_max_depth(Some(15))
                    .with_bootstrap(true)
                    .with_max_features(MaxFeatures::Sqrt)
                    .with_random_state(SEED)
                    .into(),
            ),
            (SVM_RBF, SVMClassifier::new(SVMConfig::rbf(1.0, Gamma::Scale)).into()),
            (SVM_LINEAR, SVMClassifier::new(SVMConfig::linear(0.1)).into()),
            (
                NEURAL_NETWORK,
                MLPClassifier::new(MLPConfig {
                    hidden_layers: vec![100, 50, 25],
                    activation: Activation::ReLU,
                    alpha: 0.001,
                    adaptive_learning_rate: true,
                    early_stopping: true,
                    validation_split: 0.1,
                    max_epochs: 1000,
                    random_state: SEED,
                    ..Default::default()
                })
                .into(),
            ),
            (
                LOGISTIC_REGRESSION,
                LogisticRegression::new().with_c(1.0).with_max_iter(1000).into(),
            ),
            (ADA_BOOST, AdaBoostClassifier::new(100, 1.0).with_random_state(SEED).into()),
        ])
    }
}

impl ModelBank {
    fn from_entries(entries: Vec<(&str, ClassifierModel)>) -> Self {
        Self {
            entries: entries.into_iter().map(|(n, m)| (n.to_string(), m)).collect(),
        }
    }

    /// The same eight algorithms at reduced sizes
    pub fn quick() -> Self {
        Self::from_entries(vec![
            (
                RANDOM_FOREST,
                RandomForest::new(30)
                    .with_max_depth(Some(8))
                    .with_min_samples_split(3)
                    .with_random_state(SEED)
                    .into(),
            ),
            (
                GRADIENT_BOOSTING,
                GradientBoostingClassifier::new(GradientBoostingConfig {
                    n_estimators: 40,
                    max_depth: 3,
                    min_samples_split: 3,
                    subsample: 0.8,
                    random_state: SEED,
                    ..Default::default()
                })
                .into(),
            ),
            (
                EXTRA_TREES,
                ExtraTrees::new(30)
                    .with_max_depth(Some(10))
                    .with_bootstrap(true)
                    .with_random_state(SEED)
                    .into(),
            ),
            (SVM_RBF, SVMClassifier::new(SVMConfig { max_iter: 50, ..SVMConfig::rbf(1.0, Gamma::Scale) }).into()),
            (SVM_LINEAR, SVMClassifier::new(SVMConfig { max_iter: 50, ..SVMConfig::linear(0.1) }).into()),
            (
                NEURAL_NETWORK,
                MLPClassifier::new(MLPConfig {
                    hidden_layers: vec![32, 16],
                    alpha: 0.001,
                    learning_rate: 0.005,
                    adaptive_learning_rate: true,
                    early_stopping: true,
                    max_epochs: 150,
                    random_state: SEED,
                    ..Default::default()
                })
                .into(),
            ),
            (
                LOGISTIC_REGRESSION,
                LogisticRegression::new().with_max_iter(300).into(),
            ),
            (ADA_BOOST, AdaBoostClassifier::new(30, 1.0).with_random_state(SEED).into()),
        ])
    }

    /// Replace the configuration stored under `name`, or append it
    pub fn with_model(mut self, name: impl Into<String>, model: impl Into<ClassifierModel>) -> Self {
        self.set(name, model.into());
        self
    }

    pub fn set(&mut self, name: impl Into<String>, model: ClassifierModel) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = model,
            None => self.entries.push((name, model)),
        }
    }

    /// Drop a member; returns whether it was present
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| n != name);
        self.entries.len() != before
    }

    pub fn get(&self, name: &str) -> Option<&ClassifierModel> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, m)| m)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ClassifierModel)> {
        self.entries.iter().map(|(n, m)| (n.as_str(), m))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_default_bank_order() {
        let bank = ModelBank::default();
        assert_eq!(bank.names(), MODEL_NAMES.to_vec());
        assert_eq!(ModelBank::quick().names(), MODEL_NAMES.to_vec());
        assert!(bank.iter().all(|(_, m)| !m.is_fitted()));
    }

    #[test]
    fn test_with_model_replaces_in_place() {
        let bank = ModelBank::quick().with_model(SVM_RBF, SVMClassifier::new(SVMConfig::rbf(10.0, Gamma::Auto)));
        assert_eq!(bank.len(), 8);
        assert_eq!(bank.names()[3], SVM_RBF);
        match bank.get(SVM_RBF) {
            Some(ClassifierModel::Svm(svm)) => assert_eq!(svm.config.c, 10.0),
            other => panic!("unexpected entry {:?}", other.map(|m| m.algorithm())),
        }

        let bank = bank.with_model("extra_lr", LogisticRegression::new());
        assert_eq!(bank.len(), 9);
        assert!(bank.contains("extra_lr"));
    }

    #[test]
    fn test_remove() {
        let mut bank = ModelBank::quick();
        assert!(bank.remove(ADA_BOOST));
        assert!(!bank.remove(ADA_BOOST));
        assert_eq!(bank.len(), 7);
    }

    #[test]
    fn test_dispatch_and_serde() {
        let x = array![[0.0, 1.0], [0.2, 0.8], [1.0, 0.0], [0.9, 0.1]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut model: ClassifierModel = LogisticRegression::new().with_learning_rate(0.5).into();
        model.fit(&x, &y).unwrap();
        assert!(model.is_fitted());
        assert!(model.coefficients().is_some());

        let json = serde_json::to_string(&model).unwrap();
        assert!(json.contains("\"algorithm\":\"logistic_regression\""));
        let restored: ClassifierModel = serde_json::from_str(&json).unwrap();
        assert_eq!(model.predict_proba(&x).unwrap(), restored.predict_proba(&x).unwrap());
    }
}
