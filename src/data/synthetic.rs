//! Seeded generator shaped like the WDBC reference dataset
//!
//! Size features (radius, texture, perimeter, area of the mean and worst
//! families) are drawn from normal distributions; every other feature is
//! uniform over its catalog range. Draws are class-conditional so models
//! trained on generated data still have signal to learn, while the pooled
//! location of each family stays where the reference dataset puts it.

use super::{DataSource, TrainingSet, BENIGN, MALIGNANT};
use crate::error::{EnsembleError, Result};
use crate::features::catalog::{CATALOG, FEATURE_NAMES, N_FEATURES};
use ndarray::{Array1, Array2};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

/// Sample count of the reference dataset
pub const REFERENCE_SAMPLES: usize = 569;
/// Share of benign samples in the reference dataset
pub const BENIGN_SHARE: f64 = 0.63;

/// Pooled (mean, std) for the normally distributed features
fn normal_family(name: &str) -> Option<(f64, f64)> {
    match name {
        "radius_mean" => Some((14.0, 3.0)),
        "texture_mean" => Some((19.0, 4.0)),
        "perimeter_mean" => Some((92.0, 25.0)),
        "area_mean" => Some((655.0, 350.0)),
        "radius_worst" => Some((16.0, 4.0)),
        "texture_worst" => Some((25.0, 6.0)),
        "perimeter_worst" => Some((107.0, 33.0)),
        "area_worst" => Some((880.0, 570.0)),
        _ => None,
    }
}

/// Per-feature sampling plan
enum Family {
    Normal { benign: Normal<f64>, malignant: Normal<f64> },
    Uniform { benign: (f64, f64), malignant: (f64, f64) },
}

/// Seeded WDBC-shaped dataset generator
#[derive(Debug, Clone)]
pub struct SyntheticGenerator {
    n_samples: usize,
    benign_share: f64,
    /// Distance between class locations, in pooled standard deviations
    separation: f64,
    seed: u64,
}

impl Default for SyntheticGenerator {
    fn default() -> Self {
        Self {
            n_samples: REFERENCE_SAMPLES,
            benign_share: BENIGN_SHARE,
            separation: 1.6,
            seed: 42,
        }
    }
}

impl SyntheticGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_samples(mut self, n: usize) -> Self {
        self.n_samples = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_separation(mut self, separation: f64) -> Self {
        self.separation = separation;
        self
    }

    fn plan(&self) -> Result<Vec<Family>> {
        let malignant_share = 1.0 - self.benign_share;
        CATALOG
            .iter()
            .map(|spec| match normal_family(spec.name) {
                Some((mean, std)) => {
                    // Shift each class so the mixture mean stays at `mean`.
                    let gap = self.separation * std;
                    let within = std * 0.8;
                    let benign = Normal::new(mean - malignant_share * gap, within)
                        .map_err(|e| EnsembleError::DataError(e.to_string()))?;
                    let malignant = Normal::new(mean + self.benign_share * gap, within)
                        .map_err(|e| EnsembleError::DataError(e.to_string()))?;
                    Ok(Family::Normal { benign, malignant })
                }
                None => {
                    let width = spec.max - spec.min;
                    Ok(Family::Uniform {
                        benign: (spec.min, spec.min + 0.65 * width),
                        malignant: (spec.min + 0.35 * width, spec.max),
                    })
                }
            })
            .collect()
    }

    /// Generate a canonical 30-feature training set
    pub fn generate(&self) -> Result<TrainingSet> {
        if self.n_samples == 0 {
            return Err(EnsembleError::InvalidParameter {
                name: "n_samples".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let plan = self.plan()?;
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let y = Array1::from_iter((0..self.n_samples).map(|_| {
            if rng.gen::<f64>() < self.benign_share {
                BENIGN
            } else {
                MALIGNANT
            }
        }));

        let mut x = Array2::zeros((self.n_samples, N_FEATURES));
        for (j, (family, spec)) in plan.iter().zip(CATALOG.iter()).enumerate() {
            for i in 0..self.n_samples {
                let malignant = y[i] == MALIGNANT;
                let value = match family {
                    Family::Normal { benign, malignant: m } => {
                        let draw = if malignant { m.sample(&mut rng) } else { benign.sample(&mut rng) };
                        draw.clamp(spec.min, spec.max)
                    }
                    Family::Uniform { benign, malignant: m } => {
                        let (lo, hi) = if malignant { *m } else { *benign };
                        if hi > lo { rng.gen_range(lo..hi) } else { lo }
                    }
                };
                x[[i, j]] = value;
            }
        }

        TrainingSet::new(
            FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            x,
            y,
            DataSource::Synthetic,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Axis;

    #[test]
    fn test_reference_shape() {
        let set = SyntheticGenerator::new().generate().unwrap();
        assert_eq!(set.n_samples(), 569);
        assert_eq!(set.n_features(), 30);
        assert_eq!(set.source, DataSource::Synthetic);

        let (benign, malignant) = set.class_counts();
        assert!(benign > 0 && malignant > 0);
        let share = benign as f64 / 569.0;
        assert!((share - 0.63).abs() < 0.06, "benign share = {}", share);
    }

    #[test]
    fn test_values_within_catalog_ranges() {
        let set = SyntheticGenerator::new().generate().unwrap();
        for (j, spec) in CATALOG.iter().enumerate() {
            let col = set.x.column(j);
            assert!(col.iter().all(|&v| v >= spec.min && v <= spec.max), "{}", spec.name);
        }
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let a = SyntheticGenerator::new().with_samples(50).generate().unwrap();
        let b = SyntheticGenerator::new().with_samples(50).generate().unwrap();
        let c = SyntheticGenerator::new().with_samples(50).with_seed(7).generate().unwrap();
        assert_eq!(a.x, b.x);
        assert_eq!(a.y, b.y);
        assert_ne!(a.x, c.x);
    }

    #[test]
    fn test_radius_mean_tracks_pooled_location() {
        let set = SyntheticGenerator::new().generate().unwrap();
        let mean = set.x.column(0).mean().unwrap();
        assert!((mean - 14.0).abs() < 1.0, "radius_mean average = {}", mean);

        // malignant rows are larger on average
        let (mut b, mut m) = (Vec::new(), Vec::new());
        for (row, &label) in set.x.axis_iter(Axis(0)).zip(set.y.iter()) {
            if label == MALIGNANT { m.push(row[0]) } else { b.push(row[0]) }
        }
        let avg = |v: &[f64]| v.iter().sum::<f64>() / v.len() as f64;
        assert!(avg(&m) > avg(&b));
    }

    #[test]
    fn test_zero_samples_rejected() {
        assert!(SyntheticGenerator::new().with_samples(0).generate().is_err());
    }
}
