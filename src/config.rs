//! Engine configuration read from the environment

use crate::data::WDBC_URL;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Runtime configuration shared by the CLI, the server and the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding the persisted ensemble bundle
    pub models_dir: PathBuf,
    /// Reference dataset location
    pub dataset_url: String,
    /// Retrieval timeout for the reference dataset
    pub fetch_timeout_secs: u64,
    /// Share of samples held out for evaluation after training
    pub test_size: f64,
    /// Seed for splits, folds and model initialization
    pub random_state: u64,
    pub host: String,
    pub port: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            models_dir: std::env::var("MODELS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./models")),
            dataset_url: std::env::var("WDBC_DATASET_URL").unwrap_or_else(|_| WDBC_URL.to_string()),
            fetch_timeout_secs: std::env::var("WDBC_FETCH_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            test_size: 0.2,
            random_state: 42,
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
        }
    }
}

impl EngineConfig {
    pub fn with_models_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.models_dir = dir.into();
        self
    }

    pub fn with_dataset_url(mut self, url: impl Into<String>) -> Self {
        self.dataset_url = url.into();
        self
    }

    pub fn with_fetch_timeout(mut self, secs: u64) -> Self {
        self.fetch_timeout_secs = secs;
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_address(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides() {
        let config = EngineConfig::default()
            .with_models_dir("/tmp/wisconsin-models")
            .with_fetch_timeout(5)
            .with_test_size(0.25)
            .with_address("127.0.0.1", 9000);
        assert_eq!(config.models_dir, PathBuf::from("/tmp/wisconsin-models"));
        assert_eq!(config.fetch_timeout_secs, 5);
        assert_eq!(config.test_size, 0.25);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.random_state, 42);
    }
}
