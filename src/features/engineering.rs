//! Derived ratio and aggregate features
//!
//! The engineered block is appended after the 30 canonical features. Its
//! order is part of every persisted bundle's feature ordering, so it must
//! never change between training and inference.

use super::catalog::{index_of, FeatureGroup, N_FEATURES};
use super::vector::{EnhancedFeatureVector, FeatureVector, N_ENHANCED};
use crate::data::TrainingSet;
use crate::error::{EnsembleError, Result};
use ndarray::{Array2, Axis};

/// Number of engineered features
pub const N_ENGINEERED: usize = 10;

/// Engineered feature names in output order
pub const ENGINEERED_NAMES: [&str; N_ENGINEERED] = [
    "area_perimeter_ratio",
    "compactness_smoothness_ratio",
    "concavity_compactness_ratio",
    "mean_se_ratio",
    "worst_mean_ratio",
    "shape_irregularity",
    "texture_complexity",
    "mean_features_avg",
    "se_features_avg",
    "worst_features_avg",
];

/// How an engineered feature is computed from the canonical ones
#[derive(Debug, Clone, Copy, PartialEq)]
enum Derivation {
    /// a / b
    Ratio(&'static str, &'static str),
    /// (a + b) / 2
    Mean(&'static str, &'static str),
    /// a * b
    Product(&'static str, &'static str),
    /// Mean over one statistic family
    GroupAverage(FeatureGroup),
}

const DERIVATIONS: [Derivation; N_ENGINEERED] = [
    Derivation::Ratio("area_mean", "perimeter_mean"),
    Derivation::Ratio("compactness_mean", "smoothness_mean"),
    Derivation::Ratio("concavity_mean", "compactness_mean"),
    Derivation::Ratio("radius_mean", "radius_se"),
    Derivation::Ratio("radius_worst", "radius_mean"),
    Derivation::Mean("concavity_mean", "concave_points_mean"),
    Derivation::Product("texture_mean", "fractal_dimension_mean"),
    Derivation::GroupAverage(FeatureGroup::Mean),
    Derivation::GroupAverage(FeatureGroup::Se),
    Derivation::GroupAverage(FeatureGroup::Worst),
];

impl Derivation {
    fn apply(&self, values: &[f64]) -> f64 {
        // Names in DERIVATIONS are catalog members, checked in tests.
        let at = |name: &str| index_of(name).map(|i| values[i]).unwrap_or(f64::NAN);
        match *self {
            Derivation::Ratio(a, b) => at(a) / at(b),
            Derivation::Mean(a, b) => (at(a) + at(b)) / 2.0,
            Derivation::Product(a, b) => at(a) * at(b),
            Derivation::GroupAverage(group) => {
                let start = group.offset();
                values[start..start + 10].iter().sum::<f64>() / 10.0
            }
        }
    }
}

fn derive(values: &[f64]) -> [f64; N_ENGINEERED] {
    let mut out = [0.0; N_ENGINEERED];
    for (slot, d) in out.iter_mut().zip(DERIVATIONS.iter()) {
        *slot = d.apply(values);
    }
    out
}

/// Append the engineered features to a single record
pub fn enhance(features: &FeatureVector) -> EnhancedFeatureVector {
    EnhancedFeatureVector::from_parts(features, derive(features.as_slice()))
}

/// Append the engineered columns to every row of a canonical training set
pub fn enhance_matrix(set: &TrainingSet) -> Result<TrainingSet> {
    if set.n_features() != N_FEATURES {
        return Err(EnsembleError::ShapeError {
            expected: format!("{} canonical features", N_FEATURES),
            actual: format!("{} features", set.n_features()),
        });
    }

    let n = set.n_samples();
    let mut x = Array2::zeros((n, N_ENHANCED));
    for (i, row) in set.x.axis_iter(Axis(0)).enumerate() {
        let values = row.to_vec();
        let derived = derive(&values);
        for (j, v) in values.iter().chain(derived.iter()).enumerate() {
            x[[i, j]] = *v;
        }
    }

    Ok(TrainingSet {
        feature_names: EnhancedFeatureVector::names(),
        x,
        y: set.y.clone(),
        source: set.source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataSource;
    use crate::features::catalog::{CATALOG, FEATURE_NAMES};
    use ndarray::{Array1, Array2};

    fn typical_vector() -> FeatureVector {
        let mut values = [0.0; N_FEATURES];
        for (v, spec) in values.iter_mut().zip(CATALOG.iter()) {
            *v = (spec.typical.0 + spec.typical.1) / 2.0 + 0.01;
        }
        FeatureVector::new(values)
    }

    #[test]
    fn test_derivation_names_are_catalog_members() {
        for d in DERIVATIONS.iter() {
            match d {
                Derivation::Ratio(a, b) | Derivation::Mean(a, b) | Derivation::Product(a, b) => {
                    assert!(index_of(a).is_some(), "{} not in catalog", a);
                    assert!(index_of(b).is_some(), "{} not in catalog", b);
                }
                Derivation::GroupAverage(_) => {}
            }
        }
    }

    #[test]
    fn test_enhance_literal_relations() {
        let v = typical_vector();
        let e = enhance(&v);
        let g = |n: &str| v.get(n).unwrap();
        let d = e.derived();

        assert_eq!(e.as_slice().len(), 40);
        assert_eq!(&e.as_slice()[..30], v.as_slice());
        assert_eq!(d[0], g("area_mean") / g("perimeter_mean"));
        assert_eq!(d[1], g("compactness_mean") / g("smoothness_mean"));
        assert_eq!(d[2], g("concavity_mean") / g("compactness_mean"));
        assert_eq!(d[3], g("radius_mean") / g("radius_se"));
        assert_eq!(d[4], g("radius_worst") / g("radius_mean"));
        assert_eq!(d[5], (g("concavity_mean") + g("concave_points_mean")) / 2.0);
        assert_eq!(d[6], g("texture_mean") * g("fractal_dimension_mean"));

        let mean_avg: f64 = FEATURE_NAMES[..10].iter().map(|n| g(n)).sum::<f64>() / 10.0;
        assert!((d[7] - mean_avg).abs() < 1e-12);
        let worst_avg: f64 = FEATURE_NAMES[20..].iter().map(|n| g(n)).sum::<f64>() / 10.0;
        assert!((d[9] - worst_avg).abs() < 1e-12);
    }

    #[test]
    fn test_enhance_is_bit_reproducible() {
        let v = typical_vector();
        let a = enhance(&v);
        let b = enhance(&v);
        for (x, y) in a.as_slice().iter().zip(b.as_slice().iter()) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }

    #[test]
    fn test_enhance_matrix_matches_single_record() {
        let v = typical_vector();
        let x = Array2::from_shape_vec((2, 30), [v.as_slice(), v.as_slice()].concat()).unwrap();
        let set = TrainingSet {
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            x,
            y: Array1::from_vec(vec![0.0, 1.0]),
            source: DataSource::Synthetic,
        };
        let enhanced = enhance_matrix(&set).unwrap();
        assert_eq!(enhanced.n_features(), 40);
        assert_eq!(enhanced.feature_names, EnhancedFeatureVector::names());
        let single = enhance(&v);
        for j in 0..40 {
            assert_eq!(enhanced.x[[1, j]].to_bits(), single.as_slice()[j].to_bits());
        }
    }

    #[test]
    fn test_enhance_matrix_rejects_enhanced_input() {
        let v = typical_vector();
        let x = Array2::from_shape_vec((1, 30), v.as_slice().to_vec()).unwrap();
        let set = TrainingSet {
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            x,
            y: Array1::from_vec(vec![0.0]),
            source: DataSource::Remote,
        };
        let once = enhance_matrix(&set).unwrap();
        assert!(enhance_matrix(&once).is_err());
    }
}
