//! API route definitions

use std::sync::Arc;
use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::{handlers, state::AppState};

async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": true,
            "message": "Not found. Visit /api/health to check API status.",
        })),
    )
}

async fn handle_405() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({
            "error": true,
            "message": "Method not allowed. Check the API documentation for supported methods.",
        })),
    )
}

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let wisconsin = Router::new()
        .route("/dataset-info", get(handlers::dataset_info))
        .route("/feature-analysis", get(handlers::feature_analysis))
        .route("/feature-validation/:feature_name", get(handlers::feature_validation))
        .route("/train-ensemble", post(handlers::train_ensemble))
        .route("/ensemble-status", get(handlers::ensemble_status))
        .route("/predict", post(handlers::predict))
        .route("/feature-importance", get(handlers::feature_importance));

    let api_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/wisconsin", wisconsin)
        // Single random-forest model
        .route("/train-model", post(handlers::train_simple))
        .route("/predict", post(handlers::predict_simple))
        .route("/feature-importance", get(handlers::simple_feature_importance))
        .fallback(handle_404)
        .method_not_allowed_fallback(handle_405);

    // CORS configured via CORS_ORIGIN env var (default: allow all)
    let cors = match std::env::var("CORS_ORIGIN") {
        Ok(origin) if !origin.is_empty() && origin != "*" => match origin.parse::<axum::http::HeaderValue>() {
            Ok(value) => CorsLayer::new().allow_origin(value),
            Err(_) => CorsLayer::new().allow_origin(Any),
        },
        _ => CorsLayer::new().allow_origin(Any),
    }
    .allow_methods(Any)
    .allow_headers(Any);

    Router::new()
        .nest("/api", api_routes)
        .fallback(handle_404)
        .method_not_allowed_fallback(handle_405)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
