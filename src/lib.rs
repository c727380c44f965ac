//! Wisconsin ensemble - breast cancer risk prediction
//!
//! A weighted soft-voting ensemble of eight classifiers trained on the
//! Wisconsin Diagnostic Breast Cancer dataset, with a single random-forest
//! baseline alongside it.
//!
//! # Modules
//!
//! ## Core
//! - [`features`] - canonical feature catalog, engineering and validation
//! - [`data`] - dataset retrieval, synthetic fallback and statistics
//! - [`preprocessing`] - standard and robust scaling
//! - [`training`] - classifiers, cross-validation and metrics
//! - [`ensemble`] - model bank, weighting, prediction and evaluation
//!
//! ## Serving
//! - [`store`] - on-disk bundle persistence
//! - [`inference`] - the long-lived prediction service
//! - [`server`] - HTTP API
//! - [`cli`] - command-line interface

pub mod config;
pub mod error;

pub mod data;
pub mod ensemble;
pub mod features;
pub mod preprocessing;
pub mod training;

pub mod cli;
pub mod inference;
pub mod server;
pub mod store;

pub use error::{EnsembleError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::error::{EnsembleError, Result};

    pub use crate::data::{DataSource, DatasetProvider, DatasetStatistics, SyntheticGenerator, TrainingSet};
    pub use crate::features::{enhance, validate, FeatureVector, ValidationResult, FEATURE_NAMES};

    pub use crate::ensemble::{
        evaluate, feature_importance, predict, ClassProbabilities, Diagnosis, EnsembleBundle, EnsembleTrainer,
        ModelBank, PredictionResult, RiskLevel,
    };
    pub use crate::training::{Classifier, CrossValidator};

    pub use crate::inference::{PredictRequest, PredictionService, SimplePredictor, TrainOptions};
    pub use crate::store::ModelStore;
}
