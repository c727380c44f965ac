//! Feature definitions
//!
//! - [`catalog`] - the 30 canonical WDBC features with empirical ranges
//! - [`vector`] - fixed-order records and the name-keyed adapter
//! - [`engineering`] - derived ratio and aggregate features
//! - [`validation`] - advisory range checks

pub mod catalog;
pub mod engineering;
pub mod validation;
pub mod vector;

pub use catalog::{FeatureGroup, FeatureSpec, CATALOG, FEATURE_NAMES, N_FEATURES};
pub use engineering::{enhance, enhance_matrix, ENGINEERED_NAMES, N_ENGINEERED};
pub use validation::{validate, validate_all, ValidationResult};
pub use vector::{EnhancedFeatureVector, FeatureVector, N_ENHANCED};
