//! Weighted ensemble over the model bank
//!
//! - [`bank`] - the named classifier configurations
//! - [`tuning`] - grid search over a bank member
//! - [`trainer`] - parallel fitting, shared-fold CV and weighting
//! - [`predictor`] - weighted soft voting with entropy uncertainty
//! - [`evaluation`] - held-out metrics and feature importance

pub mod bank;
mod bundle;
pub mod evaluation;
pub mod predictor;
mod trainer;
pub mod tuning;

pub use bank::{ClassifierModel, ModelBank, MODEL_NAMES};
pub use bundle::{EnsembleBundle, EnsembleMember, ModelPerformance};
pub use evaluation::{evaluate, feature_importance, EvaluationReport, FeatureImportanceReport, GroupedImportance};
pub use predictor::{
    entropy_uncertainty, predict, predict_batch, ClassProbabilities, Diagnosis, IndividualPrediction,
    PredictionResult, RiskLevel,
};
pub use trainer::{EnsembleTrainer, TrainingOutcome, TrainingSummary};
pub use tuning::{TuningCandidate, TuningResult, TUNABLE_MODELS};
