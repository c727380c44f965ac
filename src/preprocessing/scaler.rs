//! Per-feature centering and scaling over dense matrices

use crate::error::{EnsembleError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Type of scaler to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    Standard,
    /// Robust scaling using median and IQR
    Robust,
}

/// Parameters for one fitted column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct ScalerParams {
    center: f64, // mean or median
    scale: f64,  // std or IQR
}

/// Feature scaler fitted column by column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    scaler_type: ScalerType,
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

/// Quantile with linear interpolation between order statistics
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

impl Scaler {
    /// Create a new scaler
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            params: Vec::new(),
            is_fitted: false,
        }
    }

    /// Median/IQR scaler
    pub fn robust() -> Self {
        Self::new(ScalerType::Robust)
    }

    /// Mean/std scaler
    pub fn standard() -> Self {
        Self::new(ScalerType::Standard)
    }

    pub fn scaler_type(&self) -> ScalerType {
        self.scaler_type
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn n_features(&self) -> usize {
        self.params.len()
    }

    /// Fit the scaler to the data
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(EnsembleError::DataError("Cannot fit scaler on empty data".to_string()));
        }
        let params: Vec<ScalerParams> = x
            .axis_iter(Axis(1))
            .map(|col| self.compute_params(col))
            .collect();
        self.params = params;
        self.is_fitted = true;
        Ok(self)
    }

    /// Transform the data
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x.ncols())?;
        let mut out = x.clone();
        for (mut col, p) in out.axis_iter_mut(Axis(1)).zip(self.params.iter()) {
            col.mapv_inplace(|v| (v - p.center) / p.scale);
        }
        Ok(out)
    }

    /// Transform a single record
    pub fn transform_row(&self, row: &[f64]) -> Result<Array1<f64>> {
        self.check_width(row.len())?;
        Ok(row
            .iter()
            .zip(self.params.iter())
            .map(|(v, p)| (v - p.center) / p.scale)
            .collect())
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Undo the transform
    pub fn inverse_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x.ncols())?;
        let mut out = x.clone();
        for (mut col, p) in out.axis_iter_mut(Axis(1)).zip(self.params.iter()) {
            col.mapv_inplace(|v| v * p.scale + p.center);
        }
        Ok(out)
    }

    fn check_width(&self, width: usize) -> Result<()> {
        if !self.is_fitted {
            return Err(EnsembleError::ModelNotFitted);
        }
        if width != self.params.len() {
            return Err(EnsembleError::ShapeError {
                expected: format!("{} features", self.params.len()),
                actual: format!("{} features", width),
            });
        }
        Ok(())
    }

    fn compute_params(&self, col: ArrayView1<f64>) -> ScalerParams {
        match self.scaler_type {
            ScalerType::Standard => {
                let mean = col.mean().unwrap_or(0.0);
                let std = col.std(0.0);
                ScalerParams {
                    center: mean,
                    scale: if std == 0.0 || !std.is_finite() { 1.0 } else { std },
                }
            }
            ScalerType::Robust => {
                let mut sorted = col.to_vec();
                sorted.sort_by(|a, b| a.total_cmp(b));
                let median = quantile(&sorted, 0.5);
                let iqr = quantile(&sorted, 0.75) - quantile(&sorted, 0.25);
                ScalerParams {
                    center: median,
                    scale: if iqr == 0.0 || !iqr.is_finite() { 1.0 } else { iqr },
                }
            }
        }
    }
}
