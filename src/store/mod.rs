//! On-disk persistence of a trained ensemble
//!
//! Layout under the store directory:
//!
//! ```text
//! wisconsin_scaler.json
//! wisconsin_<model>.json          one per trained member
//! wisconsin_ensemble_metadata.json
//! ```

use crate::ensemble::{ClassifierModel, EnsembleBundle, EnsembleMember, ModelPerformance};
use crate::error::{EnsembleError, Result};
use crate::preprocessing::Scaler;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const SCALER_FILE: &str = "wisconsin_scaler.json";
const METADATA_FILE: &str = "wisconsin_ensemble_metadata.json";

/// Ensemble-level facts stored next to the model artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleMetadata {
    pub ensemble_weights: BTreeMap<String, f64>,
    pub model_performance: BTreeMap<String, ModelPerformance>,
    pub feature_names: Vec<String>,
    pub trained_at: DateTime<Utc>,
    pub model_count: usize,
    #[serde(default)]
    pub failed_models: BTreeMap<String, String>,
    /// Member order at save time
    #[serde(default)]
    pub model_order: Vec<String>,
}

impl EnsembleMetadata {
    fn from_bundle(bundle: &EnsembleBundle) -> Self {
        Self {
            ensemble_weights: bundle.weights(),
            model_performance: bundle.performance(),
            feature_names: bundle.feature_names.clone(),
            trained_at: bundle.trained_at,
            model_count: bundle.model_count(),
            failed_models: bundle.failed_models.clone(),
            model_order: bundle.model_names(),
        }
    }

    /// Names the bundle was saved with; older metadata without an explicit
    /// order falls back to the weight keys
    fn expected_models(&self) -> Vec<String> {
        if self.model_order.is_empty() {
            self.ensemble_weights.keys().cloned().collect()
        } else {
            self.model_order.clone()
        }
    }
}

/// Result of reading a store directory
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub bundle: Option<EnsembleBundle>,
    pub loaded: bool,
    pub loaded_count: usize,
    pub expected_count: usize,
}

impl LoadOutcome {
    fn empty(expected_count: usize) -> Self {
        Self {
            bundle: None,
            loaded: false,
            loaded_count: 0,
            expected_count,
        }
    }
}

/// Directory-backed store for ensemble bundles
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn model_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("wisconsin_{}.json", name))
    }

    pub fn scaler_path(&self) -> PathBuf {
        self.dir.join(SCALER_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    /// Write every member, the scaler and the metadata
    pub fn save(&self, bundle: &EnsembleBundle) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        for member in &bundle.members {
            let path = self.model_path(&member.name);
            write_json(&path, &member.model)?;
            debug!(model = %member.name, path = %path.display(), "Saved model");
        }
        write_json(&self.scaler_path(), &bundle.scaler)?;
        write_json(&self.metadata_path(), &EnsembleMetadata::from_bundle(bundle))?;

        info!(
            dir = %self.dir.display(),
            models = bundle.model_count(),
            "Saved ensemble"
        );
        Ok(())
    }

    /// Read back whatever is usable.
    ///
    /// Missing or unreadable pieces never error: a missing model shrinks the
    /// ensemble, a missing scaler or metadata file means nothing is loaded.
    pub fn load(&self) -> Result<LoadOutcome> {
        if !self.dir.is_dir() {
            debug!(dir = %self.dir.display(), "Model directory absent");
            return Ok(LoadOutcome::empty(0));
        }

        let metadata: EnsembleMetadata = match read_json(&self.metadata_path()) {
            Some(m) => m,
            None => return Ok(LoadOutcome::empty(0)),
        };
        let expected = metadata.expected_models();
        let expected_count = expected.len();

        let scaler: Scaler = match read_json(&self.scaler_path()) {
            Some(s) => s,
            None => return Ok(LoadOutcome::empty(expected_count)),
        };

        let mut members = Vec::with_capacity(expected_count);
        for name in &expected {
            let Some(model) = read_json::<ClassifierModel>(&self.model_path(name)) else {
                warn!(model = %name, "Model artifact missing or unreadable");
                continue;
            };
            members.push(EnsembleMember {
                name: name.clone(),
                model,
                weight: metadata.ensemble_weights.get(name).copied().unwrap_or(0.0),
                performance: metadata.model_performance.get(name).cloned().unwrap_or(ModelPerformance {
                    mean_accuracy: 0.0,
                    std_accuracy: 0.0,
                    cv_scores: Vec::new(),
                }),
            });
        }

        let loaded_count = members.len();
        info!(loaded = loaded_count, expected = expected_count, "Loaded ensemble models");
        if members.is_empty() {
            return Ok(LoadOutcome::empty(expected_count));
        }

        let bundle = EnsembleBundle::new(scaler, members, metadata.feature_names, metadata.failed_models)
            .with_trained_at(metadata.trained_at);
        Ok(LoadOutcome {
            bundle: Some(bundle),
            loaded: true,
            loaded_count,
            expected_count,
        })
    }
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|e| {
        EnsembleError::SerializationError(format!("Failed to write {}: {}", path.display(), e))
    })?;
    writer.flush().map_err(|e| {
        EnsembleError::SerializationError(format!("Failed to flush {}: {}", path.display(), e))
    })
}

/// `None` for absent or undecodable files
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let file = File::open(path).ok()?;
    match serde_json::from_reader(BufReader::new(file)) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to decode artifact");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::predict;
    use crate::training::{Classifier, LogisticRegression, SVMClassifier, SVMConfig};
    use ndarray::array;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("wisconsin_store_{}_{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn bundle() -> EnsembleBundle {
        let x = array![[0.0, 1.0], [0.2, 0.9], [1.0, 0.0], [0.9, 0.1], [0.1, 1.1], [1.1, 0.2]];
        let y = array![0.0, 0.0, 1.0, 1.0, 0.0, 1.0];
        let mut scaler = Scaler::robust();
        let xs = scaler.fit_transform(&x).unwrap();
        let mut lr = LogisticRegression::new();
        lr.fit(&xs, &y).unwrap();
        let mut svm = SVMClassifier::new(SVMConfig::linear(1.0));
        svm.fit(&xs, &y).unwrap();
        let perf = |acc: f64| ModelPerformance {
            mean_accuracy: acc,
            std_accuracy: 0.01,
            cv_scores: vec![acc; 5],
        };
        EnsembleBundle::new(
            scaler,
            vec![
                EnsembleMember {
                    name: "svm_linear".into(),
                    model: svm.into(),
                    weight: 0.75,
                    performance: perf(0.75),
                },
                EnsembleMember {
                    name: "logistic_regression".into(),
                    model: lr.into(),
                    weight: 0.25,
                    performance: perf(0.25),
                },
            ],
            vec!["a".into(), "b".into()],
            BTreeMap::new(),
        )
    }

    #[test]
    fn test_empty_dir_not_loaded() {
        let outcome = ModelStore::new(temp_dir("absent")).load().unwrap();
        assert!(!outcome.loaded);
        assert!(outcome.bundle.is_none());
        assert_eq!(outcome.loaded_count, 0);
    }

    #[test]
    fn test_round_trip_preserves_predictions() {
        let dir = temp_dir("round_trip");
        let store = ModelStore::new(&dir);
        let original = bundle();
        store.save(&original).unwrap();
        assert!(store.scaler_path().exists());
        assert!(store.model_path("svm_linear").exists());

        let outcome = store.load().unwrap();
        assert!(outcome.loaded);
        assert_eq!((outcome.loaded_count, outcome.expected_count), (2, 2));
        let loaded = outcome.bundle.unwrap();
        assert_eq!(loaded.model_names(), original.model_names());
        assert_eq!(loaded.feature_names, original.feature_names);
        assert_eq!(loaded.trained_at, original.trained_at);
        for (name, perf) in original.performance() {
            let back = &loaded.performance()[&name];
            assert_eq!(back.cv_scores.len(), perf.cv_scores.len());
            assert!(back.cv_scores.iter().zip(&perf.cv_scores).all(|(a, b)| (a - b).abs() < 1e-12));
            assert!((back.mean_accuracy - perf.mean_accuracy).abs() < 1e-12);
            assert!((back.std_accuracy - perf.std_accuracy).abs() < 1e-12);
            assert!((loaded.weights()[&name] - original.weights()[&name]).abs() < 1e-12);
        }

        let metadata: EnsembleMetadata = read_json(&store.metadata_path()).unwrap();
        assert_eq!(metadata.model_order, vec!["svm_linear".to_string(), "logistic_regression".to_string()]);

        let a = predict(&[0.1, 0.95], &original, false).unwrap();
        let b = predict(&[0.1, 0.95], &loaded, false).unwrap();
        assert!((a.confidence - b.confidence).abs() < 1e-12);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_follows_saved_order() {
        let dir = temp_dir("order");
        let store = ModelStore::new(&dir);
        store.save(&bundle()).unwrap();

        // alphabetical weight keys would put logistic_regression first
        let mut metadata: EnsembleMetadata = read_json(&store.metadata_path()).unwrap();
        assert_eq!(metadata.model_order[0], "svm_linear");
        assert_eq!(metadata.ensemble_weights.keys().next().unwrap(), "logistic_regression");
        let loaded = store.load().unwrap().bundle.unwrap();
        assert_eq!(loaded.model_names(), metadata.model_order);

        metadata.model_order.reverse();
        write_json(&store.metadata_path(), &metadata).unwrap();
        let reordered = store.load().unwrap().bundle.unwrap();
        assert_eq!(reordered.model_names(), vec!["logistic_regression".to_string(), "svm_linear".to_string()]);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_write_json_is_complete_on_return() {
        let dir = temp_dir("flush");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("large.json");
        let value: Vec<f64> = (0..20_000).map(|i| i as f64 * 0.5).collect();
        write_json(&path, &value).unwrap();
        let back: Vec<f64> = read_json(&path).unwrap();
        assert_eq!(back.len(), value.len());
        assert!(write_json(&dir.join("missing").join("x.json"), &value).is_err());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_model_renormalizes() {
        let dir = temp_dir("partial");
        let store = ModelStore::new(&dir);
        store.save(&bundle()).unwrap();
        fs::remove_file(store.model_path("svm_linear")).unwrap();
        fs::write(store.dir().join("wisconsin_unused.json"), b"not json").unwrap();

        let outcome = store.load().unwrap();
        assert!(outcome.loaded);
        assert_eq!((outcome.loaded_count, outcome.expected_count), (1, 2));
        let weights = outcome.bundle.unwrap().weights();
        assert!((weights["logistic_regression"] - 1.0).abs() < 1e-12);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_corrupt_artifacts() {
        let dir = temp_dir("corrupt");
        let store = ModelStore::new(&dir);
        store.save(&bundle()).unwrap();
        fs::write(store.model_path("svm_linear"), b"{").unwrap();
        fs::write(store.model_path("logistic_regression"), b"[]").unwrap();
        let outcome = store.load().unwrap();
        assert!(!outcome.loaded);
        assert_eq!(outcome.expected_count, 2);

        store.save(&bundle()).unwrap();
        fs::remove_file(store.scaler_path()).unwrap();
        assert!(!store.load().unwrap().loaded);
        let _ = fs::remove_dir_all(&dir);
    }
}
