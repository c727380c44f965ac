//! Remote WDBC retrieval with a synthetic fallback
//!
//! Retrieval is the only blocking I/O boundary of training. It runs under an
//! explicit timeout and any failure (network, status, parse) degrades to the
//! seeded [`SyntheticGenerator`] instead of surfacing an error.

use super::synthetic::SyntheticGenerator;
use super::{DataSource, TrainingSet, BENIGN, MALIGNANT};
use crate::config::EngineConfig;
use crate::error::{EnsembleError, Result};
use crate::features::catalog::{FEATURE_NAMES, N_FEATURES};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::io::Cursor;
use std::time::Duration;
use tracing::{info, warn};

/// Canonical location of the reference dataset
pub const WDBC_URL: &str =
    "https://archive.ics.uci.edu/ml/machine-learning-databases/breast-cancer-wisconsin/wdbc.data";

/// id, diagnosis, 30 features
const WDBC_COLUMNS: usize = N_FEATURES + 2;

/// Fetches the reference dataset, falling back to generated data
#[derive(Debug, Clone)]
pub struct DatasetProvider {
    url: String,
    timeout: Duration,
    fallback: SyntheticGenerator,
}

impl Default for DatasetProvider {
    fn default() -> Self {
        Self {
            url: WDBC_URL.to_string(),
            timeout: Duration::from_secs(30),
            fallback: SyntheticGenerator::default(),
        }
    }
}

impl DatasetProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::default()
            .with_url(config.dataset_url.clone())
            .with_timeout(Duration::from_secs(config.fetch_timeout_secs))
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_fallback(mut self, generator: SyntheticGenerator) -> Self {
        self.fallback = generator;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Retrieve the reference dataset.
    ///
    /// Only a misconfigured fallback generator can make this fail; retrieval
    /// problems are logged and answered with synthetic data.
    pub async fn fetch(&self) -> Result<TrainingSet> {
        match self.fetch_remote().await {
            Ok(set) => {
                let (benign, malignant) = set.class_counts();
                info!(
                    url = %self.url,
                    samples = set.n_samples(),
                    benign,
                    malignant,
                    "Dataset loaded"
                );
                Ok(set)
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "Dataset retrieval failed, generating synthetic data");
                self.synthetic()
            }
        }
    }

    /// The fallback dataset, without attempting retrieval
    pub fn synthetic(&self) -> Result<TrainingSet> {
        self.fallback.generate()
    }

    async fn fetch_remote(&self) -> Result<TrainingSet> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| EnsembleError::DataError(format!("Failed to create HTTP client: {}", e)))?;

        let response = client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| EnsembleError::DataError(e.to_string()))?
            .error_for_status()
            .map_err(|e| EnsembleError::DataError(e.to_string()))?;

        let body = response
            .text()
            .await
            .map_err(|e| EnsembleError::DataError(e.to_string()))?;

        parse_wdbc(&body)
    }
}

/// Parse the headerless `id,diagnosis,f1..f30` file.
///
/// The id column is dropped and M/B map to 1/0.
pub fn parse_wdbc(text: &str) -> Result<TrainingSet> {
    let df = CsvReadOptions::default()
        .with_has_header(false)
        .with_infer_schema_length(Some(100))
        .into_reader_with_file_handle(Cursor::new(text.as_bytes()))
        .finish()?;

    if df.width() != WDBC_COLUMNS {
        return Err(EnsembleError::ShapeError {
            expected: format!("{} columns", WDBC_COLUMNS),
            actual: format!("{} columns", df.width()),
        });
    }
    if df.height() == 0 {
        return Err(EnsembleError::DataError("Dataset is empty".to_string()));
    }

    let columns = df.get_columns();
    let diagnosis = columns[1].as_materialized_series().str()?;
    let y = diagnosis
        .into_iter()
        .map(|d| match d.map(str::trim) {
            Some("M") => Ok(MALIGNANT),
            Some("B") => Ok(BENIGN),
            other => Err(EnsembleError::DataError(format!(
                "Unknown diagnosis {:?}",
                other
            ))),
        })
        .collect::<Result<Vec<f64>>>()?;

    let col_data = columns[2..]
        .iter()
        .zip(FEATURE_NAMES.iter())
        .map(|(column, name)| {
            let cast = column.cast(&DataType::Float64)?;
            cast.as_materialized_series()
                .f64()?
                .into_iter()
                .map(|v| v.ok_or_else(|| EnsembleError::DataError(format!("Missing value in {}", name))))
                .collect::<Result<Vec<f64>>>()
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    let x = Array2::from_shape_fn((df.height(), N_FEATURES), |(r, c)| col_data[c][r]);

    TrainingSet::new(
        FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        x,
        Array1::from_vec(y),
        DataSource::Remote,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: u32, diagnosis: &str, base: f64) -> String {
        let values: Vec<String> = (0..N_FEATURES).map(|j| format!("{}", base + j as f64 * 0.01)).collect();
        format!("{},{},{}", id, diagnosis, values.join(","))
    }

    #[test]
    fn test_parse_wdbc_rows() {
        let text = [row(842302, "M", 17.99), row(8510426, "B", 13.54), row(8510653, "B", 13.08)].join("\n");
        let set = parse_wdbc(&text).unwrap();
        assert_eq!(set.n_samples(), 3);
        assert_eq!(set.n_features(), 30);
        assert_eq!(set.source, DataSource::Remote);
        assert_eq!(set.y.to_vec(), vec![1.0, 0.0, 0.0]);
        assert!((set.x[[0, 0]] - 17.99).abs() < 1e-9);
        assert!((set.x[[1, 29]] - (13.54 + 0.29)).abs() < 1e-9);
        assert_eq!(set.feature_names[0], "radius_mean");
    }

    #[test]
    fn test_parse_rejects_unknown_diagnosis() {
        let text = [row(1, "M", 10.0), row(2, "X", 11.0)].join("\n");
        assert!(parse_wdbc(&text).is_err());
    }

    #[test]
    fn test_parse_rejects_wrong_width() {
        assert!(parse_wdbc("1,M,2.0,3.0\n2,B,4.0,5.0\n").is_err());
        assert!(parse_wdbc("<html>service unavailable</html>").is_err());
    }

    #[tokio::test]
    async fn test_unreachable_source_falls_back_to_synthetic() {
        let provider = DatasetProvider::new()
            .with_url("http://127.0.0.1:9/wdbc.data")
            .with_timeout(Duration::from_secs(2));
        let set = provider.fetch().await.unwrap();
        assert_eq!(set.source, DataSource::Synthetic);
        assert_eq!(set.n_samples(), 569);
        let (benign, malignant) = set.class_counts();
        assert!(benign > 0 && malignant > 0);
    }
}
