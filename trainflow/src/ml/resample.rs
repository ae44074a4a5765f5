//! Class rebalancing: SMOTE over-sampling followed by edited nearest
//! neighbours cleaning.

use super::neighbors::KdTree;
use crate::errors::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Rebalances a labelled feature matrix.
pub trait Resampler: Send + Sync {
    /// Returns the resampled features and labels.
    fn fit_resample(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<(Array2<f64>, Array1<f64>)>;
}

/// SMOTE-ENN parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoteEnnParams {
    /// Neighbours considered when synthesizing minority samples.
    pub k_neighbors: usize,
    /// Neighbours consulted by the cleaning pass.
    pub enn_neighbors: usize,
    /// Seed for the synthesis; unseeded when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for SmoteEnnParams {
    fn default() -> Self {
        Self {
            k_neighbors: 5,
            enn_neighbors: 3,
            seed: None,
        }
    }
}

/// Over-samples the minority class up to the majority count, then drops every
/// sample (of any class) whose nearest neighbours do not all share its label.
#[derive(Debug, Clone, Default)]
pub struct SmoteEnn {
    params: SmoteEnnParams,
}

impl SmoteEnn {
    #[must_use]
    pub fn new(params: SmoteEnnParams) -> Self {
        Self { params }
    }

    fn rng(&self) -> StdRng {
        match self.params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    fn smote(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        rng: &mut StdRng,
    ) -> Result<(Array2<f64>, Array1<f64>)> {
        let counts = class_counts(y);
        if counts.len() < 2 {
            tracing::warn!(classes = counts.len(), "Skipping over-sampling: fewer than two classes");
            return Ok((x.to_owned(), y.to_owned()));
        }
        let (minority, n_minority) = counts
            .iter()
            .copied()
            .min_by(|a, b| a.1.cmp(&b.1).then(a.0.total_cmp(&b.0)))
            .ok_or_else(|| PipelineError::data("no classes to resample"))?;
        let n_majority = counts.iter().map(|c| c.1).max().unwrap_or(n_minority);
        let n_new = n_majority - n_minority;
        if n_new == 0 {
            return Ok((x.to_owned(), y.to_owned()));
        }
        if n_minority < 2 {
            tracing::warn!(minority, "Skipping over-sampling: minority class has a single sample");
            return Ok((x.to_owned(), y.to_owned()));
        }

        let k = self.params.k_neighbors.min(n_minority - 1).max(1);
        let minority_rows: Vec<usize> = (0..y.len()).filter(|&i| y[i] == minority).collect();
        let minority_x = x.select(Axis(0), &minority_rows);
        let tree = KdTree::build(minority_x.view());
        let neighbors: Vec<Vec<usize>> = (0..minority_x.nrows())
            .map(|i| {
                tree.query(minority_x.row(i), k, Some(i))
                    .into_iter()
                    .map(|n| n.index)
                    .collect()
            })
            .collect();

        let mut synthetic = Array2::zeros((n_new, x.ncols()));
        for mut row in synthetic.rows_mut() {
            let base = rng.gen_range(0..minority_x.nrows());
            let near = &neighbors[base];
            let other = near[rng.gen_range(0..near.len())];
            let gap: f64 = rng.gen();
            let a = minority_x.row(base);
            let b = minority_x.row(other);
            row.assign(&(&a + &((&b - &a) * gap)));
        }

        let x_out = ndarray::concatenate(Axis(0), &[x.view(), synthetic.view()])
            .map_err(|e| PipelineError::data(format!("cannot append synthetic rows: {e}")))?;
        let mut y_out = y.to_vec();
        y_out.extend(std::iter::repeat(minority).take(n_new));

        tracing::debug!(minority, synthesized = n_new, "Over-sampled minority class");
        Ok((x_out, Array1::from(y_out)))
    }

    fn edited_nearest_neighbours(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> (Array2<f64>, Array1<f64>) {
        let k = self.params.enn_neighbors;
        if k == 0 || x.nrows() <= 1 {
            return (x.to_owned(), y.to_owned());
        }
        let tree = KdTree::build(x);
        let keep: Vec<usize> = (0..x.nrows())
            .filter(|&i| {
                tree.query(x.row(i), k, Some(i))
                    .iter()
                    .all(|n| y[n.index] == y[i])
            })
            .collect();

        tracing::debug!(
            before = x.nrows(),
            after = keep.len(),
            "Edited nearest neighbours cleaning"
        );
        (x.select(Axis(0), &keep), y.select(Axis(0), &keep))
    }
}

impl Resampler for SmoteEnn {
    fn fit_resample(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<(Array2<f64>, Array1<f64>)> {
        if x.nrows() != y.len() {
            return Err(PipelineError::data(format!(
                "{} feature rows but {} labels",
                x.nrows(),
                y.len()
            )));
        }
        let mut rng = self.rng();
        let (x_over, y_over) = self.smote(x, y, &mut rng)?;
        Ok(self.edited_nearest_neighbours(x_over.view(), y_over.view()))
    }
}

/// Distinct labels with their counts, in ascending label order.
#[must_use]
pub fn class_counts(y: ArrayView1<'_, f64>) -> Vec<(f64, usize)> {
    let mut labels: Vec<f64> = y.to_vec();
    labels.sort_by(f64::total_cmp);
    let mut counts: Vec<(f64, usize)> = Vec::new();
    for label in labels {
        match counts.last_mut() {
            Some((last, n)) if *last == label => *n += 1,
            _ => counts.push((label, 1)),
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn seeded(seed: u64) -> SmoteEnn {
        SmoteEnn::new(SmoteEnnParams {
            seed: Some(seed),
            ..SmoteEnnParams::default()
        })
    }

    /// Two well separated clusters, 20 negatives and 6 positives.
    fn imbalanced() -> (Array2<f64>, Array1<f64>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..20 {
            let t = f64::from(i) * 0.05;
            rows.extend([t, 1.0 - t]);
            labels.push(0.0);
        }
        for i in 0..6 {
            let t = f64::from(i) * 0.1;
            rows.extend([10.0 + t, 10.0 - t]);
            labels.push(1.0);
        }
        (
            Array2::from_shape_vec((26, 2), rows).unwrap(),
            Array1::from(labels),
        )
    }

    #[test]
    fn test_class_counts() {
        assert_eq!(
            class_counts(array![1.0, 0.0, 1.0, 1.0].view()),
            vec![(0.0, 1), (1.0, 3)]
        );
    }

    #[test]
    fn test_balances_separated_classes() {
        let (x, y) = imbalanced();
        let (x_res, y_res) = seeded(3).fit_resample(x.view(), y.view()).unwrap();

        assert_eq!(x_res.nrows(), y_res.len());
        assert_eq!(class_counts(y_res.view()), vec![(0.0, 20), (1.0, 20)]);
        // Synthetic positives stay inside the positive cluster.
        for (row, label) in x_res.rows().into_iter().zip(y_res.iter()) {
            if *label == 1.0 {
                assert!(row[0] >= 10.0 && row[0] <= 10.5);
            }
        }
    }

    #[test]
    fn test_seeded_resample_is_reproducible() {
        let (x, y) = imbalanced();
        let first = seeded(11).fit_resample(x.view(), y.view()).unwrap();
        let second = seeded(11).fit_resample(x.view(), y.view()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_enn_removes_mislabelled_point() {
        // A lone positive inside a negative cluster is cleaned away.
        let x = array![[0.0], [0.1], [0.2], [0.3], [0.15], [5.0], [5.1], [5.2], [5.3]];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0];
        let sampler = SmoteEnn::new(SmoteEnnParams {
            k_neighbors: 1,
            enn_neighbors: 3,
            seed: Some(1),
        });

        let (_, y_res) = sampler.edited_nearest_neighbours(x.view(), y.view());
        assert!(y_res.len() < y.len());
        assert!(sampler.fit_resample(x.view(), y.view()).is_ok());
    }

    #[test]
    fn test_single_class_passes_through_smote() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![1.0, 1.0, 1.0];
        let (x_res, y_res) = seeded(0).fit_resample(x.view(), y.view()).unwrap();
        assert_eq!(x_res, x);
        assert_eq!(y_res, y);
    }

    #[test]
    fn test_length_mismatch() {
        let err = seeded(0)
            .fit_resample(array![[0.0], [1.0]].view(), array![1.0].view())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Data(_)));
    }
}
