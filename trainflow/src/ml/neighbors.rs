//! Exact k-nearest-neighbour search over the rows of a matrix.

use ndarray::{ArrayView1, ArrayView2};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A neighbour found by [`KdTree::query`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Row index in the indexed matrix.
    pub index: usize,
    /// Squared Euclidean distance to the query point.
    pub dist_sq: f64,
}

impl Eq for Neighbor {}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist_sq
            .total_cmp(&other.dist_sq)
            .then(self.index.cmp(&other.index))
    }
}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug)]
struct Node {
    point: usize,
    axis: usize,
    left: Option<usize>,
    right: Option<usize>,
}

/// A k-d tree over the rows of a borrowed matrix.
#[derive(Debug)]
pub struct KdTree<'a> {
    points: ArrayView2<'a, f64>,
    nodes: Vec<Node>,
    root: Option<usize>,
}

impl<'a> KdTree<'a> {
    /// Builds the tree by splitting on the median of cycling axes.
    #[must_use]
    pub fn build(points: ArrayView2<'a, f64>) -> Self {
        let mut tree = Self {
            points,
            nodes: Vec::with_capacity(points.nrows()),
            root: None,
        };
        let mut indices: Vec<usize> = (0..points.nrows()).collect();
        tree.root = tree.build_node(&mut indices, 0);
        tree
    }

    fn build_node(&mut self, indices: &mut [usize], depth: usize) -> Option<usize> {
        if indices.is_empty() {
            return None;
        }
        let dims = self.points.ncols();
        let axis = if dims == 0 { 0 } else { depth % dims };
        let mid = indices.len() / 2;
        if dims > 0 {
            let points = self.points;
            indices.select_nth_unstable_by(mid, |&a, &b| {
                points[[a, axis]].total_cmp(&points[[b, axis]])
            });
        }
        let point = indices[mid];
        let (left, rest) = indices.split_at_mut(mid);
        let right = &mut rest[1..];

        let left = self.build_node(left, depth + 1);
        let right = self.build_node(right, depth + 1);
        self.nodes.push(Node {
            point,
            axis,
            left,
            right,
        });
        Some(self.nodes.len() - 1)
    }

    /// Number of indexed rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.nrows()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns up to `k` nearest rows to `target`, closest first.
    ///
    /// `exclude` skips one row, typically the query row itself. Ties are
    /// broken by lower row index.
    #[must_use]
    pub fn query(&self, target: ArrayView1<'_, f64>, k: usize, exclude: Option<usize>) -> Vec<Neighbor> {
        if k == 0 {
            return Vec::new();
        }
        let mut heap = BinaryHeap::with_capacity(k + 1);
        if let Some(root) = self.root {
            self.search(root, target, k, exclude, &mut heap);
        }
        heap.into_sorted_vec()
    }

    fn search(
        &self,
        node_id: usize,
        target: ArrayView1<'_, f64>,
        k: usize,
        exclude: Option<usize>,
        heap: &mut BinaryHeap<Neighbor>,
    ) {
        let node = &self.nodes[node_id];
        if exclude != Some(node.point) {
            let candidate = Neighbor {
                index: node.point,
                dist_sq: squared_distance(self.points.row(node.point), target),
            };
            if heap.len() < k {
                heap.push(candidate);
            } else if heap.peek().is_some_and(|worst| candidate < *worst) {
                heap.pop();
                heap.push(candidate);
            }
        }

        if self.points.ncols() == 0 {
            for child in [node.left, node.right].into_iter().flatten() {
                self.search(child, target, k, exclude, heap);
            }
            return;
        }

        let diff = target[node.axis] - self.points[[node.point, node.axis]];
        let (near, far) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };
        if let Some(near) = near {
            self.search(near, target, k, exclude, heap);
        }
        if let Some(far) = far {
            let must_visit = heap.len() < k
                || heap.peek().is_some_and(|worst| diff * diff <= worst.dist_sq);
            if must_visit {
                self.search(far, target, k, exclude, heap);
            }
        }
    }
}

fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn brute_force(points: &Array2<f64>, target: usize, k: usize) -> Vec<usize> {
        let mut all: Vec<Neighbor> = (0..points.nrows())
            .filter(|&i| i != target)
            .map(|i| Neighbor {
                index: i,
                dist_sq: squared_distance(points.row(i), points.row(target)),
            })
            .collect();
        all.sort();
        all.into_iter().take(k).map(|n| n.index).collect()
    }

    #[test]
    fn test_query_small() {
        let points = array![[0.0, 0.0], [1.0, 0.0], [5.0, 5.0], [0.0, 2.0]];
        let tree = KdTree::build(points.view());

        let found = tree.query(points.row(0), 2, Some(0));
        let indices: Vec<usize> = found.iter().map(|n| n.index).collect();
        assert_eq!(indices, vec![1, 3]);
        assert!((found[1].dist_sq - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(7);
        let points = Array2::from_shape_fn((200, 3), |_| rng.gen_range(-10.0..10.0));
        let tree = KdTree::build(points.view());

        for target in [0, 17, 99, 199] {
            let found: Vec<usize> = tree
                .query(points.row(target), 5, Some(target))
                .into_iter()
                .map(|n| n.index)
                .collect();
            assert_eq!(found, brute_force(&points, target, 5));
        }
    }

    #[test]
    fn test_duplicates_and_large_k() {
        let points = array![[1.0], [1.0], [1.0]];
        let tree = KdTree::build(points.view());
        let found = tree.query(points.row(0), 10, Some(0));
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|n| n.dist_sq == 0.0));
    }

    #[test]
    fn test_empty_tree() {
        let points = Array2::<f64>::zeros((0, 2));
        let tree = KdTree::build(points.view());
        assert!(tree.is_empty());
        assert!(tree.query(array![0.0, 0.0].view(), 3, None).is_empty());
    }
}
