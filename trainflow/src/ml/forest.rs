//! Bagged CART classification trees.

use crate::errors::{PipelineError, Result};
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// A fitted model mapping feature rows to class labels.
pub trait Classifier: Send + Sync {
    /// Predicts one label per row.
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>>;
}

/// Node impurity measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SplitCriterion {
    /// Gini impurity.
    Gini,
    /// Shannon entropy (information gain).
    #[default]
    Entropy,
}

impl SplitCriterion {
    fn impurity(self, counts: &[usize], total: usize) -> f64 {
        if total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let total = total as f64;
        let probabilities = counts.iter().filter(|&&c| c > 0).map(|&c| {
            #[allow(clippy::cast_precision_loss)]
            let c = c as f64;
            c / total
        });
        match self {
            Self::Gini => 1.0 - probabilities.map(|p| p * p).sum::<f64>(),
            Self::Entropy => -probabilities.map(|p| p * p.log2()).sum::<f64>(),
        }
    }
}

/// Random forest hyperparameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    /// Number of trees.
    pub n_estimators: usize,
    /// Minimum samples a node needs to be split.
    pub min_samples_split: usize,
    /// Minimum samples in each child of a split.
    pub min_samples_leaf: usize,
    /// Maximum tree depth; unbounded when absent.
    pub max_depth: Option<usize>,
    /// Impurity measure.
    pub criterion: SplitCriterion,
    /// Seed for bootstrapping and feature sampling; unseeded when absent.
    pub random_state: Option<u64>,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            min_samples_split: 7,
            min_samples_leaf: 6,
            max_depth: Some(10),
            criterion: SplitCriterion::Entropy,
            random_state: Some(101),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum TreeNode {
    Leaf {
        /// Class fractions of the training samples that reached this leaf.
        distribution: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// One classification tree; nodes are stored flat with the root first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
}

struct TreeBuilder<'a, 'b> {
    x: ArrayView2<'a, f64>,
    y: &'b [usize],
    n_classes: usize,
    max_features: usize,
    params: &'b ForestParams,
    rng: StdRng,
    nodes: Vec<TreeNode>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    /// Number of sorted samples that go left.
    n_left: usize,
    impurity: f64,
}

impl TreeBuilder<'_, '_> {
    fn counts(&self, samples: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes];
        for &s in samples {
            counts[self.y[s]] += 1;
        }
        counts
    }

    fn build(&mut self, samples: &mut [usize], depth: usize) -> usize {
        let id = self.nodes.len();
        let counts = self.counts(samples);
        self.nodes.push(leaf(&counts, samples.len()));

        let n = samples.len();
        let depth_reached = self.params.max_depth.is_some_and(|max| depth >= max);
        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        if depth_reached
            || pure
            || n < self.params.min_samples_split.max(2)
            || n < 2 * self.params.min_samples_leaf.max(1)
        {
            return id;
        }

        let parent = self.params.criterion.impurity(&counts, n);
        let Some(best) = self.best_split(samples, parent) else {
            return id;
        };

        let x = self.x;
        let feature = best.feature;
        samples.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));
        let (left_samples, right_samples) = samples.split_at_mut(best.n_left);
        let left = self.build(left_samples, depth + 1);
        let right = self.build(right_samples, depth + 1);
        self.nodes[id] = TreeNode::Split {
            feature,
            threshold: best.threshold,
            left,
            right,
        };
        id
    }

    fn best_split(&mut self, samples: &[usize], parent: f64) -> Option<BestSplit> {
        let n = samples.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let mut features: Vec<usize> = (0..self.x.ncols()).collect();
        features.shuffle(&mut self.rng);
        let mut best: Option<BestSplit> = None;
        let mut sorted = samples.to_vec();
        let mut visited = 0;

        // Features constant within the node do not count towards max_features.
        for feature in features {
            if visited == self.max_features {
                break;
            }
            let x = self.x;
            sorted.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));
            if x[[sorted[0], feature]] == x[[sorted[n - 1], feature]] {
                continue;
            }
            visited += 1;

            let mut left = vec![0usize; self.n_classes];
            let mut right = self.counts(&sorted);
            for i in 0..n - 1 {
                let label = self.y[sorted[i]];
                left[label] += 1;
                right[label] -= 1;

                let n_left = i + 1;
                let here = x[[sorted[i], feature]];
                let next = x[[sorted[i + 1], feature]];
                if here == next || n_left < min_leaf || n - n_left < min_leaf {
                    continue;
                }

                #[allow(clippy::cast_precision_loss)]
                let impurity = (n_left as f64 * self.params.criterion.impurity(&left, n_left)
                    + (n - n_left) as f64 * self.params.criterion.impurity(&right, n - n_left))
                    / n as f64;
                if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                    let mut threshold = here + (next - here) / 2.0;
                    if threshold >= next {
                        threshold = here;
                    }
                    best = Some(BestSplit {
                        feature,
                        threshold,
                        n_left,
                        impurity,
                    });
                }
            }
        }

        best.filter(|b| parent - b.impurity > 1e-12)
    }
}

fn leaf(counts: &[usize], total: usize) -> TreeNode {
    #[allow(clippy::cast_precision_loss)]
    let distribution = counts
        .iter()
        .map(|&c| if total == 0 { 0.0 } else { c as f64 / total as f64 })
        .collect();
    TreeNode::Leaf { distribution }
}

impl DecisionTree {
    fn distribution(&self, row: ArrayView1<'_, f64>) -> &[f64] {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                TreeNode::Leaf { distribution } => return distribution,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Number of nodes in the tree.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// An ensemble of trees fit on bootstrap samples with `sqrt(n_features)`
/// candidate features per split. Prediction averages the leaf class
/// distributions and picks the most probable class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    classes: Vec<f64>,
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Fits a forest on `x` and `y`.
    pub fn fit(params: ForestParams, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<Self> {
        let (n_samples, n_features) = x.dim();
        if n_samples == 0 || n_features == 0 {
            return Err(PipelineError::data(format!(
                "cannot fit a forest on a {n_samples}x{n_features} matrix"
            )));
        }
        if y.len() != n_samples {
            return Err(PipelineError::data(format!(
                "{n_samples} feature rows but {} labels",
                y.len()
            )));
        }
        if params.n_estimators == 0 {
            return Err(PipelineError::Configuration(
                "forest needs at least one tree".to_string(),
            ));
        }

        let mut classes: Vec<f64> = y.to_vec();
        classes.sort_by(f64::total_cmp);
        classes.dedup();
        let encoded: Vec<usize> = y
            .iter()
            .map(|label| classes.iter().position(|c| c == label).unwrap_or(0))
            .collect();

        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let max_features = ((n_features as f64).sqrt() as usize).clamp(1, n_features);

        let mut master = match params.random_state {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut trees = Vec::with_capacity(params.n_estimators);
        for _ in 0..params.n_estimators {
            let mut rng = StdRng::seed_from_u64(master.gen());
            let mut bootstrap: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
            let mut builder = TreeBuilder {
                x,
                y: &encoded,
                n_classes: classes.len(),
                max_features,
                params: &params,
                rng,
                nodes: Vec::new(),
            };
            builder.build(&mut bootstrap, 0);
            trees.push(DecisionTree {
                nodes: builder.nodes,
            });
        }

        tracing::debug!(
            trees = trees.len(),
            classes = classes.len(),
            n_samples,
            n_features,
            "Fitted random forest"
        );
        Ok(Self {
            params,
            classes,
            n_features,
            trees,
        })
    }

    /// Class labels seen during fitting, ascending.
    #[must_use]
    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    #[must_use]
    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Averaged class probabilities for one row.
    fn proba(&self, row: ArrayView1<'_, f64>) -> Vec<f64> {
        let mut total = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            for (acc, p) in total.iter_mut().zip(tree.distribution(row)) {
                *acc += p;
            }
        }
        total
    }
}

impl Classifier for RandomForest {
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.n_features {
            return Err(PipelineError::data(format!(
                "model expects {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let proba = self.proba(row);
                let mut best = 0;
                for (i, p) in proba.iter().enumerate() {
                    if *p > proba[best] {
                        best = i;
                    }
                }
                self.classes[best]
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn small_params(n_estimators: usize) -> ForestParams {
        ForestParams {
            n_estimators,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_depth: None,
            ..ForestParams::default()
        }
    }

    #[test]
    fn test_impurity() {
        assert!((SplitCriterion::Entropy.impurity(&[5, 5], 10) - 1.0).abs() < 1e-12);
        assert!((SplitCriterion::Gini.impurity(&[5, 5], 10) - 0.5).abs() < 1e-12);
        assert!(SplitCriterion::Entropy.impurity(&[10, 0], 10).abs() < 1e-12);
    }

    #[test]
    fn test_learns_threshold() {
        let x = Array2::from_shape_fn((40, 1), |(i, _)| f64::from(u32::try_from(i).unwrap()));
        let y = Array1::from_shape_fn(40, |i| if i < 20 { 0.0 } else { 1.0 });

        let forest = RandomForest::fit(small_params(15), x.view(), y.view()).unwrap();
        assert_eq!(forest.classes(), [0.0, 1.0]);

        let predicted = forest.predict(array![[2.0], [37.0]].view()).unwrap();
        assert_eq!(predicted, array![0.0, 1.0]);
    }

    #[test]
    fn test_constant_features_predict_majority() {
        let x = Array2::<f64>::zeros((100, 3));
        let y = Array1::from_shape_fn(100, |i| if i < 55 { 1.0 } else { 0.0 });

        let forest = RandomForest::fit(small_params(25), x.view(), y.view()).unwrap();
        assert!(forest.trees().iter().all(|t| t.node_count() == 1));
        let predicted = forest.predict(x.view()).unwrap();
        assert!(predicted.iter().all(|&p| p == 1.0));
    }

    #[test]
    fn test_seeded_fit_is_reproducible() {
        let x = Array2::from_shape_fn((30, 4), |(i, j)| ((i * 7 + j * 3) % 11) as f64);
        let y = Array1::from_shape_fn(30, |i| (i % 2) as f64);

        let a = RandomForest::fit(small_params(5), x.view(), y.view()).unwrap();
        let b = RandomForest::fit(small_params(5), x.view(), y.view()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_max_depth_limits_tree() {
        let x = Array2::from_shape_fn((64, 2), |(i, j)| ((i + j) % 8) as f64);
        let y = Array1::from_shape_fn(64, |i| (i % 3 == 0) as u8 as f64);
        let params = ForestParams {
            max_depth: Some(1),
            ..small_params(3)
        };

        let forest = RandomForest::fit(params, x.view(), y.view()).unwrap();
        assert!(forest.trees().iter().all(|t| t.node_count() <= 3));
    }

    #[test]
    fn test_predict_checks_width() {
        let x = array![[0.0, 1.0], [1.0, 0.0]];
        let y = array![0.0, 1.0];
        let forest = RandomForest::fit(small_params(2), x.view(), y.view()).unwrap();
        let err = forest.predict(array![[1.0]].view()).unwrap_err();
        assert!(matches!(err, PipelineError::Data(_)));
    }

    #[test]
    fn test_fit_rejects_empty() {
        let x = Array2::<f64>::zeros((0, 2));
        let y = Array1::<f64>::zeros(0);
        assert!(RandomForest::fit(ForestParams::default(), x.view(), y.view()).is_err());
    }

    #[test]
    fn test_serde_round_trip_predicts_same() {
        let x = Array2::from_shape_fn((20, 2), |(i, j)| (i * (j + 1)) as f64);
        let y = Array1::from_shape_fn(20, |i| if i > 9 { 1.0 } else { 0.0 });
        let forest = RandomForest::fit(small_params(4), x.view(), y.view()).unwrap();

        let json = serde_json::to_string(&forest).unwrap();
        let restored: RandomForest = serde_json::from_str(&json).unwrap();
        assert_eq!(
            restored.predict(x.view()).unwrap(),
            forest.predict(x.view()).unwrap()
        );
    }
}
