//! Application state shared across handlers

use crate::inference::PredictionService;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub struct AppState {
    pub service: Arc<PredictionService>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(service: Arc<PredictionService>) -> Self {
        Self {
            service,
            started_at: Utc::now(),
        }
    }
}
