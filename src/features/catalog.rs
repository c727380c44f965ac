//! Static catalog of the 30 canonical WDBC nuclear-morphology features
//!
//! Each entry carries a human-readable description and the empirical range
//! observed in the reference dataset. The order of [`FEATURE_NAMES`] is the
//! order every model sees at inference time.

use serde::Serialize;

/// Number of canonical features
pub const N_FEATURES: usize = 30;

/// Statistic family a canonical feature belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureGroup {
    Mean,
    Se,
    Worst,
}

impl FeatureGroup {
    pub const ALL: [FeatureGroup; 3] = [FeatureGroup::Mean, FeatureGroup::Se, FeatureGroup::Worst];

    /// Offset of the group's first feature in [`FEATURE_NAMES`]
    pub fn offset(self) -> usize {
        match self {
            FeatureGroup::Mean => 0,
            FeatureGroup::Se => 10,
            FeatureGroup::Worst => 20,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FeatureGroup::Mean => "mean",
            FeatureGroup::Se => "se",
            FeatureGroup::Worst => "worst",
        }
    }
}

/// Catalog entry for one canonical feature
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FeatureSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub group: FeatureGroup,
    pub min: f64,
    pub max: f64,
    pub typical: (f64, f64),
}

impl FeatureSpec {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

macro_rules! feature {
    ($name:literal, $group:ident, $min:expr, $max:expr, ($lo:expr, $hi:expr), $desc:literal) => {
        FeatureSpec {
            name: $name,
            description: $desc,
            group: FeatureGroup::$group,
            min: $min,
            max: $max,
            typical: ($lo, $hi),
        }
    };
}

/// Full catalog in canonical order
pub static CATALOG: [FeatureSpec; N_FEATURES] = [
    feature!("radius_mean", Mean, 6.981, 28.11, (10.0, 20.0), "Mean distance from center to points on perimeter"),
    feature!("texture_mean", Mean, 9.71, 39.28, (15.0, 25.0), "Standard deviation of gray-scale values"),
    feature!("perimeter_mean", Mean, 43.79, 188.5, (80.0, 120.0), "Mean perimeter of the nucleus"),
    feature!("area_mean", Mean, 143.5, 2501.0, (500.0, 1000.0), "Mean area of the nucleus"),
    feature!("smoothness_mean", Mean, 0.05263, 0.1634, (0.08, 0.12), "Mean local variation in radius lengths"),
    feature!("compactness_mean", Mean, 0.01938, 0.3454, (0.05, 0.15), "Mean (perimeter² / area - 1.0)"),
    feature!("concavity_mean", Mean, 0.0, 0.4268, (0.0, 0.1), "Mean severity of concave portions of the contour"),
    feature!("concave_points_mean", Mean, 0.0, 0.2012, (0.0, 0.05), "Mean number of concave portions of the contour"),
    feature!("symmetry_mean", Mean, 0.106, 0.304, (0.15, 0.25), "Mean symmetry of the nucleus"),
    feature!("fractal_dimension_mean", Mean, 0.04996, 0.09744, (0.06, 0.08), "Mean \"coastline approximation\" - 1"),
    feature!("radius_se", Se, 0.1115, 2.873, (0.3, 0.8), "Standard error of radius"),
    feature!("texture_se", Se, 0.3602, 4.885, (1.0, 2.0), "Standard error of texture"),
    feature!("perimeter_se", Se, 0.757, 21.98, (2.0, 6.0), "Standard error of perimeter"),
    feature!("area_se", Se, 6.802, 542.2, (30.0, 100.0), "Standard error of area"),
    feature!("smoothness_se", Se, 0.001713, 0.03113, (0.005, 0.015), "Standard error of smoothness"),
    feature!("compactness_se", Se, 0.002252, 0.1354, (0.01, 0.04), "Standard error of compactness"),
    feature!("concavity_se", Se, 0.0, 0.396, (0.0, 0.05), "Standard error of concavity"),
    feature!("concave_points_se", Se, 0.0, 0.05279, (0.0, 0.02), "Standard error of concave points"),
    feature!("symmetry_se", Se, 0.007882, 0.07895, (0.02, 0.04), "Standard error of symmetry"),
    feature!("fractal_dimension_se", Se, 0.0008948, 0.02984, (0.003, 0.01), "Standard error of fractal dimension"),
    feature!("radius_worst", Worst, 7.93, 36.04, (12.0, 25.0), "Worst (largest) radius"),
    feature!("texture_worst", Worst, 12.02, 49.54, (20.0, 35.0), "Worst (largest) texture"),
    feature!("perimeter_worst", Worst, 50.41, 251.2, (100.0, 160.0), "Worst (largest) perimeter"),
    feature!("area_worst", Worst, 185.2, 4254.0, (800.0, 1500.0), "Worst (largest) area"),
    feature!("smoothness_worst", Worst, 0.07117, 0.2226, (0.1, 0.16), "Worst (largest) smoothness"),
    feature!("compactness_worst", Worst, 0.02729, 1.058, (0.1, 0.4), "Worst (largest) compactness"),
    feature!("concavity_worst", Worst, 0.0, 1.252, (0.0, 0.3), "Worst (largest) concavity"),
    feature!("concave_points_worst", Worst, 0.0, 0.291, (0.0, 0.1), "Worst (largest) concave points"),
    feature!("symmetry_worst", Worst, 0.1565, 0.6638, (0.2, 0.4), "Worst (largest) symmetry"),
    feature!("fractal_dimension_worst", Worst, 0.05504, 0.2075, (0.08, 0.12), "Worst (largest) fractal dimension"),
];

/// Canonical feature order
pub const FEATURE_NAMES: [&str; N_FEATURES] = [
    "radius_mean",
    "texture_mean",
    "perimeter_mean",
    "area_mean",
    "smoothness_mean",
    "compactness_mean",
    "concavity_mean",
    "concave_points_mean",
    "symmetry_mean",
    "fractal_dimension_mean",
    "radius_se",
    "texture_se",
    "perimeter_se",
    "area_se",
    "smoothness_se",
    "compactness_se",
    "concavity_se",
    "concave_points_se",
    "symmetry_se",
    "fractal_dimension_se",
    "radius_worst",
    "texture_worst",
    "perimeter_worst",
    "area_worst",
    "smoothness_worst",
    "compactness_worst",
    "concavity_worst",
    "concave_points_worst",
    "symmetry_worst",
    "fractal_dimension_worst",
];

/// Position of a canonical feature, if the name is known
pub fn index_of(name: &str) -> Option<usize> {
    FEATURE_NAMES.iter().position(|&n| n == name)
}

/// Catalog entry for a feature name
pub fn lookup(name: &str) -> Option<&'static FeatureSpec> {
    index_of(name).map(|i| &CATALOG[i])
}

/// Description for a feature, with a fallback for unknown names
pub fn description(name: &str) -> &'static str {
    lookup(name)
        .map(|spec| spec.description)
        .unwrap_or("No description available")
}

/// All catalog entries of one statistic family
pub fn group(group: FeatureGroup) -> &'static [FeatureSpec] {
    let start = group.offset();
    &CATALOG[start..start + 10]
}

/// Classify an arbitrary column name into its family.
///
/// Engineered columns carry no family suffix and return `None`.
pub fn group_of(name: &str) -> Option<FeatureGroup> {
    lookup(name).map(|spec| spec.group)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_matches_name_order() {
        for (spec, name) in CATALOG.iter().zip(FEATURE_NAMES.iter()) {
            assert_eq!(spec.name, *name);
            assert!(spec.min <= spec.max, "{} has inverted range", name);
            assert!(spec.typical.0 <= spec.typical.1);
        }
    }

    #[test]
    fn test_groups_are_contiguous() {
        for g in FeatureGroup::ALL {
            let members = group(g);
            assert_eq!(members.len(), 10);
            assert!(members.iter().all(|s| s.group == g));
            assert!(members.iter().all(|s| s.name.ends_with(g.name())));
        }
    }

    #[test]
    fn test_lookup() {
        let spec = lookup("radius_mean").unwrap();
        assert_eq!(spec.min, 6.981);
        assert_eq!(spec.max, 28.11);
        assert!(spec.contains(14.0));
        assert!(!spec.contains(500.0));
        assert!(lookup("tumor_color").is_none());
        assert_eq!(description("tumor_color"), "No description available");
        assert_eq!(index_of("fractal_dimension_worst"), Some(29));
        assert_eq!(group_of("area_perimeter_ratio"), None);
    }
}
