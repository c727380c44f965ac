//! Fixed-order feature records used at the model boundary

use super::catalog::{index_of, FEATURE_NAMES, N_FEATURES};
use super::engineering::{ENGINEERED_NAMES, N_ENGINEERED};
use crate::error::{EnsembleError, Result};
use std::collections::HashMap;

/// Width of an enhanced record: canonical features followed by engineered ones
pub const N_ENHANCED: usize = N_FEATURES + N_ENGINEERED;

/// The 30 canonical features in [`FEATURE_NAMES`] order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; N_FEATURES]);

impl FeatureVector {
    pub fn new(values: [f64; N_FEATURES]) -> Self {
        Self(values)
    }

    /// Build from a name-keyed payload.
    ///
    /// Every canonical name must be present. Extra keys are ignored here;
    /// callers that care about them validate the payload separately.
    pub fn from_map(features: &HashMap<String, f64>) -> Result<Self> {
        let mut values = [0.0; N_FEATURES];
        for (slot, name) in values.iter_mut().zip(FEATURE_NAMES.iter()) {
            *slot = *features
                .get(*name)
                .ok_or_else(|| EnsembleError::FeatureNotFound(name.to_string()))?;
        }
        Ok(Self(values))
    }

    /// Build from an ordered slice such as a dataset row
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        let arr: [f64; N_FEATURES] = values.try_into().map_err(|_| EnsembleError::ShapeError {
            expected: format!("{} features", N_FEATURES),
            actual: format!("{} features", values.len()),
        })?;
        Ok(Self(arr))
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        index_of(name).map(|i| self.0[i])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn to_map(&self) -> HashMap<String, f64> {
        FEATURE_NAMES
            .iter()
            .zip(self.0.iter())
            .map(|(n, v)| (n.to_string(), *v))
            .collect()
    }
}

impl std::ops::Index<usize> for FeatureVector {
    type Output = f64;

    fn index(&self, idx: usize) -> &f64 {
        &self.0[idx]
    }
}

/// Canonical features followed by the engineered ones
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnhancedFeatureVector([f64; N_ENHANCED]);

impl EnhancedFeatureVector {
    pub(crate) fn from_parts(base: &FeatureVector, derived: [f64; N_ENGINEERED]) -> Self {
        let mut values = [0.0; N_ENHANCED];
        values[..N_FEATURES].copy_from_slice(base.as_slice());
        values[N_FEATURES..].copy_from_slice(&derived);
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn derived(&self) -> &[f64] {
        &self.0[N_FEATURES..]
    }

    /// Column names matching [`as_slice`](Self::as_slice)
    pub fn names() -> Vec<String> {
        FEATURE_NAMES
            .iter()
            .chain(ENGINEERED_NAMES.iter())
            .map(|s| s.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_map() -> HashMap<String, f64> {
        FEATURE_NAMES
            .iter()
            .enumerate()
            .map(|(i, n)| (n.to_string(), i as f64))
            .collect()
    }

    #[test]
    fn test_from_map_orders_by_catalog() {
        let mut map = full_map();
        map.insert("unrelated".to_string(), 99.0);
        let v = FeatureVector::from_map(&map).unwrap();
        for i in 0..N_FEATURES {
            assert_eq!(v[i], i as f64);
        }
        assert_eq!(v.get("area_mean"), Some(3.0));
        assert_eq!(v.to_map().len(), N_FEATURES);
    }

    #[test]
    fn test_from_map_missing_feature() {
        let mut map = full_map();
        map.remove("symmetry_se");
        let err = FeatureVector::from_map(&map).unwrap_err();
        assert!(matches!(err, EnsembleError::FeatureNotFound(ref n) if n == "symmetry_se"));
    }

    #[test]
    fn test_from_slice_rejects_wrong_width() {
        assert!(FeatureVector::from_slice(&[1.0; 29]).is_err());
        assert!(FeatureVector::from_slice(&[1.0; 30]).is_ok());
    }

    #[test]
    fn test_enhanced_names() {
        let names = EnhancedFeatureVector::names();
        assert_eq!(names.len(), N_ENHANCED);
        assert_eq!(names[0], "radius_mean");
        assert_eq!(names[30], "area_perimeter_ratio");
        assert_eq!(names[39], "worst_features_avg");
    }
}
