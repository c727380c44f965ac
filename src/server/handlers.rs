//! HTTP request handlers

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::data::DatasetProvider;
use crate::features::catalog::{self, FeatureGroup, CATALOG, FEATURE_NAMES};
use crate::features::{validate, ENGINEERED_NAMES};
use crate::inference::{EnsembleStatus, PredictRequest, PredictResponse, SimplePrediction, TrainOptions, TrainResponse};
use crate::ensemble::FeatureImportanceReport;

use super::error::{Result, ServerError};
use super::state::AppState;

// ============================================================================
// System
// ============================================================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let uptime = chrono::Utc::now().signed_duration_since(state.started_at);
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "ensemble_loaded": state.service.is_trained(),
        "uptime_secs": uptime.num_seconds(),
    }))
}

// ============================================================================
// Dataset
// ============================================================================

pub async fn dataset_info() -> Json<Value> {
    let names = |group: FeatureGroup| -> Vec<&'static str> { catalog::group(group).iter().map(|s| s.name).collect() };
    let descriptions: HashMap<&str, &str> = CATALOG.iter().map(|s| (s.name, s.description)).collect();

    Json(json!({
        "dataset_name": "Wisconsin Breast Cancer Dataset (Diagnostic)",
        "source": "UCI Machine Learning Repository",
        "url": "https://archive.ics.uci.edu/ml/datasets/Breast+Cancer+Wisconsin+(Diagnostic)",
        "feature_groups": {
            "mean_features": names(FeatureGroup::Mean),
            "se_features": names(FeatureGroup::Se),
            "worst_features": names(FeatureGroup::Worst),
            "enhanced_features": ENGINEERED_NAMES,
        },
        "feature_counts": {
            "mean_features": 10,
            "standard_error_features": 10,
            "worst_features": 10,
            "total_features": FEATURE_NAMES.len(),
            "enhanced_features": ENGINEERED_NAMES.len(),
        },
        "feature_descriptions": descriptions,
        "clinical_context": {
            "description": "Features computed from digitized images of fine needle aspirate (FNA) of breast mass",
            "diagnosis": "Binary classification: Malignant (M) or Benign (B)",
            "sample_size": "569",
            "feature_type": "Real-valued",
            "clinical_relevance": "Features describe characteristics of cell nuclei present in the image",
        },
    }))
}

/// Correlation analysis over the dataset as currently retrievable
pub async fn feature_analysis(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let stats = state.service.dataset_statistics().await?;
    let feature_info: HashMap<&str, Value> = CATALOG
        .iter()
        .map(|s| {
            (
                s.name,
                json!({
                    "description": s.description,
                    "range": { "min": s.min, "max": s.max },
                    "group": s.group,
                }),
            )
        })
        .collect();

    Ok(Json(json!({
        "source": stats.source,
        "total_samples": stats.total_samples,
        "benign_samples": stats.benign_samples,
        "malignant_samples": stats.malignant_samples,
        "group_correlations": stats.group_correlations,
        "top_predictive_features": stats.top_predictive(10),
        "feature_correlations": stats.features,
        "feature_info": feature_info,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ValueQuery {
    value: f64,
}

pub async fn feature_validation(
    Path(name): Path<String>,
    query: std::result::Result<Query<ValueQuery>, QueryRejection>,
) -> Result<Json<Value>> {
    let Query(query) = query?;
    let range = catalog::lookup(&name).map(|s| {
        json!({
            "min": s.min,
            "max": s.max,
            "typical_min": s.typical.0,
            "typical_max": s.typical.1,
        })
    });

    Ok(Json(json!({
        "feature_name": name,
        "value": query.value,
        "validation": validate(&name, query.value),
        "description": catalog::description(&name),
        "range": range,
    })))
}

// ============================================================================
// Ensemble
// ============================================================================

pub async fn ensemble_status(State(state): State<Arc<AppState>>) -> Json<EnsembleStatus> {
    Json(state.service.status())
}

/// An empty body trains with defaults
pub async fn train_ensemble(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<TrainResponse>> {
    let options: TrainOptions = if body.iter().all(u8::is_ascii_whitespace) {
        TrainOptions::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ServerError::BadRequest(format!("Invalid training request: {}", e)))?
    };

    info!(tuning = options.tuning, quick = options.quick, "Ensemble training requested");
    let response = state.service.train(options).await?;
    Ok(Json(response))
}

pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>> {
    let Json(request) = payload?;
    Ok(Json(state.service.predict(&request)?))
}

pub async fn feature_importance(State(state): State<Arc<AppState>>) -> Result<Json<FeatureImportanceReport>> {
    Ok(Json(state.service.feature_importance()?))
}

// ============================================================================
// Single random-forest model
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct FeaturesRequest {
    features: HashMap<String, f64>,
}

#[derive(Debug, Serialize)]
pub struct RankedFeature {
    feature: String,
    importance: f64,
}

pub async fn train_simple(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let service = Arc::clone(&state.service);
    let data = DatasetProvider::from_config(service.config()).fetch().await?;
    let report = tokio::task::spawn_blocking(move || service.simple().train(&data))
        .await
        .map_err(|e| ServerError::Internal(format!("training task failed: {}", e)))??;

    Ok(Json(json!({
        "success": true,
        "message": "Model trained successfully",
        "results": report,
    })))
}

pub async fn predict_simple(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<FeaturesRequest>, JsonRejection>,
) -> Result<Json<SimplePrediction>> {
    let Json(request) = payload?;
    Ok(Json(state.service.simple().predict(&request.features)?))
}

pub async fn simple_feature_importance(State(state): State<Arc<AppState>>) -> Result<Json<Vec<RankedFeature>>> {
    let ranked = state
        .service
        .simple()
        .feature_importance()?
        .into_iter()
        .map(|(feature, importance)| RankedFeature { feature, importance })
        .collect();
    Ok(Json(ranked))
}
