//! Column scalers and the column transformer that routes columns to them.

use crate::errors::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Zero-mean, unit-variance scaling.
///
/// Uses the population standard deviation. Constant columns get a scale of
/// 1 so they map to zero instead of NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Per-column mean.
    pub mean: Array1<f64>,
    /// Per-column standard deviation, 1 for constant columns.
    pub scale: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(x: ArrayView2<'_, f64>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(PipelineError::data("cannot fit a scaler on zero rows"));
        }
        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| PipelineError::data("cannot fit a scaler on zero rows"))?;
        let scale = x.std_axis(Axis(0), 0.0).mapv(|s| if s == 0.0 { 1.0 } else { s });
        Ok(Self { mean, scale })
    }

    #[must_use]
    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        (&x - &self.mean) / &self.scale
    }
}

/// Scaling into `[0, 1]` using the fitted minimum and range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    /// Per-column minimum.
    pub data_min: Array1<f64>,
    /// Per-column `max - min`, 1 for constant columns.
    pub data_range: Array1<f64>,
}

impl MinMaxScaler {
    pub fn fit(x: ArrayView2<'_, f64>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(PipelineError::data("cannot fit a scaler on zero rows"));
        }
        let data_min = x.fold_axis(Axis(0), f64::INFINITY, |acc, &v| acc.min(v));
        let data_max = x.fold_axis(Axis(0), f64::NEG_INFINITY, |acc, &v| acc.max(v));
        let data_range = (&data_max - &data_min).mapv(|r| if r == 0.0 { 1.0 } else { r });
        Ok(Self {
            data_min,
            data_range,
        })
    }

    #[must_use]
    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        (&x - &self.data_min) / &self.data_range
    }
}

/// Applies a standard scaler and a min-max scaler to named column groups and
/// passes every other column through unchanged.
///
/// Output column order: standard-scaled, min-max-scaled, then passthrough
/// columns in their input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnTransformer {
    standard_columns: Vec<String>,
    minmax_columns: Vec<String>,
    passthrough_columns: Vec<String>,
    standard: Option<StandardScaler>,
    minmax: Option<MinMaxScaler>,
}

impl ColumnTransformer {
    /// Fits both scalers on the named columns of `x`.
    pub fn fit(
        columns: &[String],
        x: ArrayView2<'_, f64>,
        standard_columns: &[String],
        minmax_columns: &[String],
    ) -> Result<Self> {
        for name in standard_columns.iter().chain(minmax_columns) {
            if !columns.contains(name) {
                return Err(PipelineError::data(format!(
                    "scaler column '{name}' is not among the engineered features"
                )));
            }
        }
        let passthrough_columns: Vec<String> = columns
            .iter()
            .filter(|c| !standard_columns.contains(*c) && !minmax_columns.contains(*c))
            .cloned()
            .collect();

        let standard = if standard_columns.is_empty() {
            None
        } else {
            Some(StandardScaler::fit(select(columns, x, standard_columns)?.view())?)
        };
        let minmax = if minmax_columns.is_empty() {
            None
        } else {
            Some(MinMaxScaler::fit(select(columns, x, minmax_columns)?.view())?)
        };

        Ok(Self {
            standard_columns: standard_columns.to_vec(),
            minmax_columns: minmax_columns.to_vec(),
            passthrough_columns,
            standard,
            minmax,
        })
    }

    /// Transforms `x`, selecting the fitted columns by name.
    ///
    /// Columns not seen during fitting are ignored.
    pub fn transform(&self, columns: &[String], x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let mut blocks: Vec<Array2<f64>> = Vec::with_capacity(3);
        if let Some(scaler) = &self.standard {
            blocks.push(scaler.transform(select(columns, x, &self.standard_columns)?.view()));
        }
        if let Some(scaler) = &self.minmax {
            blocks.push(scaler.transform(select(columns, x, &self.minmax_columns)?.view()));
        }
        blocks.push(select(columns, x, &self.passthrough_columns)?);

        let views: Vec<_> = blocks.iter().map(Array2::view).collect();
        ndarray::concatenate(Axis(1), &views)
            .map_err(|e| PipelineError::data(format!("cannot assemble transformed matrix: {e}")))
    }

    /// Names of the output columns, in output order.
    #[must_use]
    pub fn output_columns(&self) -> Vec<String> {
        self.standard_columns
            .iter()
            .chain(&self.minmax_columns)
            .chain(&self.passthrough_columns)
            .cloned()
            .collect()
    }
}

fn select(columns: &[String], x: ArrayView2<'_, f64>, wanted: &[String]) -> Result<Array2<f64>> {
    let indices = wanted
        .iter()
        .map(|name| {
            columns
                .iter()
                .position(|c| c == name)
                .ok_or_else(|| PipelineError::data(format!("missing feature column '{name}'")))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(x.select(Axis(1), &indices))
}
