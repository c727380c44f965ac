//! Prediction-time entry points
//!
//! - [`service`] - the ensemble service shared by the HTTP layer and the CLI
//! - [`simple`] - a standalone random-forest predictor on the raw features

pub mod service;
pub mod simple;

pub use service::{
    DatasetInfo, EnsembleStatus, PredictRequest, PredictResponse, PredictionService, TrainOptions, TrainResponse,
    TUNED_MODELS,
};
pub use simple::{SimplePrediction, SimplePredictor, SimpleTrainingReport};
