//! Data preprocessing module
//!
//! Feature scaling for the classifier inputs:
//! - StandardScaler (mean / standard deviation)
//! - RobustScaler (median / interquartile range)

mod scaler;

pub use scaler::{Scaler, ScalerType};
