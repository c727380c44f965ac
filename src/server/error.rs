//! Error types for the server

use crate::error::EnsembleError;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Ensemble(#[from] EnsembleError),
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ServerError {
    fn from(rejection: QueryRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

impl ServerError {
    fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Ensemble(e) => match e {
                EnsembleError::NotTrained => StatusCode::SERVICE_UNAVAILABLE,
                EnsembleError::FeatureNotFound(_)
                | EnsembleError::ShapeError { .. }
                | EnsembleError::InvalidParameter { .. }
                | EnsembleError::UnknownModel(_)
                | EnsembleError::NoParameterGrid(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ServerError::Ensemble(EnsembleError::FeatureNotFound(name)) => {
                format!("Missing required feature: {}", name)
            }
            other => other.to_string(),
        };
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!(detail = %message, "Request failed");
        }

        let body = Json(json!({
            "error": true,
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ServerError::from(EnsembleError::NotTrained).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ServerError::from(EnsembleError::FeatureNotFound("radius_mean".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::from(EnsembleError::NoModelsTrained { failures: vec![] }).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ServerError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
    }
}
