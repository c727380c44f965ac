//! Advisory range validation against the reference dataset

use super::catalog::lookup;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Outcome of validating one submitted feature value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Check a value against the catalog's empirical range.
///
/// Unknown names pass. NaN is treated as out of range.
pub fn validate(feature_name: &str, value: f64) -> ValidationResult {
    let Some(spec) = lookup(feature_name) else {
        return ValidationResult {
            valid: true,
            message: "Feature not found in dataset".to_string(),
            suggestion: None,
        };
    };

    if !spec.contains(value) {
        return ValidationResult {
            valid: false,
            message: format!(
                "Value {} is outside Wisconsin dataset range [{:.3}, {:.3}]",
                value, spec.min, spec.max
            ),
            suggestion: Some(format!(
                "Typical range: {:.3} - {:.3}",
                spec.typical.0, spec.typical.1
            )),
        };
    }

    ValidationResult {
        valid: true,
        message: "Value is within valid range".to_string(),
        suggestion: None,
    }
}

/// Validate every entry of a name-keyed payload
pub fn validate_all(features: &HashMap<String, f64>) -> BTreeMap<String, ValidationResult> {
    features
        .iter()
        .map(|(name, value)| (name.clone(), validate(name, *value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_feature_is_valid() {
        let r = validate("nucleus_color", 123.0);
        assert!(r.valid);
        assert_eq!(r.message, "Feature not found in dataset");
        assert!(r.suggestion.is_none());
    }

    #[test]
    fn test_out_of_range() {
        let r = validate("radius_mean", 500.0);
        assert!(!r.valid);
        assert_eq!(
            r.message,
            "Value 500 is outside Wisconsin dataset range [6.981, 28.110]"
        );
        assert_eq!(r.suggestion.as_deref(), Some("Typical range: 10.000 - 20.000"));
    }

    #[test]
    fn test_range_bounds_inclusive() {
        assert!(validate("radius_mean", 6.981).valid);
        assert!(validate("radius_mean", 28.11).valid);
        assert!(!validate("radius_mean", 6.98).valid);
        assert!(!validate("concavity_mean", -0.001).valid);
        assert!(!validate("area_mean", f64::NAN).valid);
    }

    #[test]
    fn test_validate_all() {
        let mut payload = HashMap::new();
        payload.insert("radius_mean".to_string(), 14.0);
        payload.insert("texture_mean".to_string(), 100.0);
        let results = validate_all(&payload);
        assert!(results["radius_mean"].valid);
        assert_eq!(results["radius_mean"].message, "Value is within valid range");
        assert!(!results["texture_mean"].valid);
    }
}
