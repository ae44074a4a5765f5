//! Persistence of numeric matrices.
//!
//! Matrices are stored as the `ndarray` serde form (`{"v":1,"dim":[r,c],"data":[..]}`).
//! Floats are written in shortest round-trip form and parsed with
//! `float_roundtrip`, so a saved matrix loads back bit-exactly.

use crate::errors::{PipelineError, Result};
use crate::utils::ensure_parent_dir;
use ndarray::{Array1, Array2, ArrayView2, Axis, Slice};
use std::path::Path;

/// Saves a matrix as JSON, creating parent directories.
pub fn save_array(path: &Path, array: &Array2<f64>) -> Result<()> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_vec(array)?;
    std::fs::write(path, json).map_err(|e| PipelineError::io(path, e))?;
    tracing::debug!(path = %path.display(), shape = ?array.shape(), "Saved array");
    Ok(())
}

/// Loads a matrix saved by [`save_array`].
pub fn load_array(path: &Path) -> Result<Array2<f64>> {
    let bytes = std::fs::read(path).map_err(|e| PipelineError::io(path, e))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Appends `labels` as the last column of `features`.
pub fn append_label_column(features: ArrayView2<'_, f64>, labels: &Array1<f64>) -> Result<Array2<f64>> {
    let (rows, cols) = features.dim();
    if labels.len() != rows {
        return Err(PipelineError::data(format!(
            "{} labels for {rows} feature rows",
            labels.len()
        )));
    }
    let mut out = Array2::zeros((rows, cols + 1));
    out.slice_axis_mut(Axis(1), Slice::from(..cols)).assign(&features);
    out.column_mut(cols).assign(labels);
    Ok(out)
}

/// Splits a matrix into features and its last column.
pub fn split_label_column(array: &Array2<f64>) -> Result<(Array2<f64>, Array1<f64>)> {
    let cols = array.ncols();
    if cols < 2 {
        return Err(PipelineError::data(format!(
            "matrix needs at least one feature and a label column, got {cols} columns"
        )));
    }
    let features = array.slice_axis(Axis(1), Slice::from(..cols - 1)).to_owned();
    let labels = array.column(cols - 1).to_owned();
    Ok((features, labels))
}
