//! Error types for the Wisconsin ensemble engine

use thiserror::Error;

/// Result type alias for ensemble operations
pub type Result<T> = std::result::Result<T, EnsembleError>;

/// Main error type for the ensemble engine
#[derive(Error, Debug)]
pub enum EnsembleError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Inference error: {0}")]
    InferenceError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Model {0} not found")]
    UnknownModel(String),

    #[error("No parameter grid defined for {0}")]
    NoParameterGrid(String),

    #[error("No models trained successfully: {}", summarize(.failures))]
    NoModelsTrained { failures: Vec<(String, String)> },

    #[error("No valid predictions available: {}", summarize(.failures))]
    NoValidPredictions { failures: Vec<(String, String)> },

    #[error("Ensemble not trained. Please train the model first.")]
    NotTrained,
}

fn summarize(failures: &[(String, String)]) -> String {
    if failures.is_empty() {
        return "no models attempted".to_string();
    }
    failures
        .iter()
        .map(|(name, cause)| format!("{}: {}", name, cause))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<polars::error::PolarsError> for EnsembleError {
    fn from(err: polars::error::PolarsError) -> Self {
        EnsembleError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for EnsembleError {
    fn from(err: serde_json::Error) -> Self {
        EnsembleError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for EnsembleError {
    fn from(err: ndarray::ShapeError) -> Self {
        EnsembleError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EnsembleError::DataError("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");

        let err = EnsembleError::ShapeError {
            expected: "40 features".to_string(),
            actual: "30 features".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid shape: expected 40 features, got 30 features"
        );
    }

    #[test]
    fn test_failure_summary() {
        let err = EnsembleError::NoModelsTrained {
            failures: vec![
                ("svm_rbf".to_string(), "did not converge".to_string()),
                ("ada_boost".to_string(), "bad weights".to_string()),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("svm_rbf: did not converge"));
        assert!(msg.contains("ada_boost: bad weights"));

        let err = EnsembleError::NoValidPredictions { failures: vec![] };
        assert!(err.to_string().contains("no models attempted"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: EnsembleError = io_err.into();
        assert!(matches!(err, EnsembleError::IoError(_)));
    }
}
