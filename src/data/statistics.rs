//! Dataset summaries: class balance, per-feature moments, label correlation

use super::{DataSource, TrainingSet};
use crate::features::catalog::{group_of, FeatureGroup};
use ndarray::ArrayView1;
use serde::Serialize;
use std::collections::BTreeMap;

/// Moments of one column and its Pearson correlation with the diagnosis
#[derive(Debug, Clone, Serialize)]
pub struct FeatureSummary {
    pub name: String,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub correlation: f64,
}

/// Descriptive statistics for a training set
#[derive(Debug, Clone, Serialize)]
pub struct DatasetStatistics {
    pub source: DataSource,
    pub total_samples: usize,
    pub total_features: usize,
    pub benign_samples: usize,
    pub malignant_samples: usize,
    pub benign_percentage: f64,
    pub malignant_percentage: f64,
    /// Sorted by correlation, strongest positive first
    pub features: Vec<FeatureSummary>,
    /// Average correlation per statistic family
    pub group_correlations: BTreeMap<String, f64>,
}

fn pearson(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    let n = a.len() as f64;
    if n < 2.0 {
        return 0.0;
    }
    let ma = a.sum() / n;
    let mb = b.sum() / n;
    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        cov += (x - ma) * (y - mb);
        va += (x - ma).powi(2);
        vb += (y - mb).powi(2);
    }
    let denom = (va * vb).sqrt();
    if denom > 0.0 { cov / denom } else { 0.0 }
}

impl DatasetStatistics {
    pub fn compute(set: &TrainingSet) -> Self {
        let (benign, malignant) = set.class_counts();
        let total = set.n_samples().max(1) as f64;

        let mut features: Vec<FeatureSummary> = set
            .feature_names
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let col = set.x.column(j);
                let mean = col.mean().unwrap_or(0.0);
                FeatureSummary {
                    name: name.clone(),
                    mean,
                    // Sample standard deviation
                    std: if col.len() > 1 { col.std(1.0) } else { 0.0 },
                    min: col.iter().cloned().fold(f64::INFINITY, f64::min),
                    max: col.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
                    correlation: pearson(col, set.y.view()),
                }
            })
            .collect();

        let mut group_correlations = BTreeMap::new();
        for group in FeatureGroup::ALL {
            let values: Vec<f64> = features
                .iter()
                .filter(|f| group_of(&f.name) == Some(group))
                .map(|f| f.correlation)
                .collect();
            if !values.is_empty() {
                let avg = values.iter().sum::<f64>() / values.len() as f64;
                group_correlations.insert(format!("{}_features", group.name()), avg);
            }
        }

        features.sort_by(|a, b| b.correlation.total_cmp(&a.correlation));

        Self {
            source: set.source,
            total_samples: set.n_samples(),
            total_features: set.n_features(),
            benign_samples: benign,
            malignant_samples: malignant,
            benign_percentage: benign as f64 / total * 100.0,
            malignant_percentage: malignant as f64 / total * 100.0,
            features,
            group_correlations,
        }
    }

    /// The `n` features most positively correlated with malignancy
    pub fn top_predictive(&self, n: usize) -> &[FeatureSummary] {
        &self.features[..n.min(self.features.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SyntheticGenerator;
    use ndarray::array;

    #[test]
    fn test_pearson_extremes() {
        let a = array![1.0, 2.0, 3.0, 4.0];
        let b = array![2.0, 4.0, 6.0, 8.0];
        let c = array![4.0, 3.0, 2.0, 1.0];
        assert!((pearson(a.view(), b.view()) - 1.0).abs() < 1e-12);
        assert!((pearson(a.view(), c.view()) + 1.0).abs() < 1e-12);
        assert_eq!(pearson(a.view(), array![1.0, 1.0, 1.0, 1.0].view()), 0.0);
    }

    #[test]
    fn test_statistics_on_synthetic_data() {
        let set = SyntheticGenerator::new().generate().unwrap();
        let stats = DatasetStatistics::compute(&set);
        assert_eq!(stats.total_samples, 569);
        assert_eq!(stats.total_features, 30);
        assert_eq!(stats.benign_samples + stats.malignant_samples, 569);
        assert!((stats.benign_percentage + stats.malignant_percentage - 100.0).abs() < 1e-9);
        assert_eq!(stats.group_correlations.len(), 3);

        let top = stats.top_predictive(5);
        assert_eq!(top.len(), 5);
        assert!(top.windows(2).all(|w| w[0].correlation >= w[1].correlation));
        assert!(top[0].correlation > 0.3);
    }
}
