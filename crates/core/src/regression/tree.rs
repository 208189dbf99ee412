//! CART regression tree with a squared-error split criterion.
//!
//! Construction is iterative (explicit work stack) so fully grown trees on
//! tens of thousands of rows never approach the thread stack limit. Split
//! search walks features in column order and keeps the first strictly best
//! split, which makes fitting fully deterministic for a given dataset.

use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::CoreError;
use crate::features::{FeatureRow, FEATURE_COUNT};

/// Growth limits for a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Maximum depth of any leaf; `None` grows until leaves are pure.
    pub max_depth: Option<usize>,
    /// Minimum rows a node needs before a split is attempted.
    pub min_samples_split: usize,
    /// Minimum rows on each side of a split.
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Node {
    Leaf {
        value: f64,
        samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        value: f64,
        samples: usize,
    },
}

/// A fitted regression tree. Nodes live in a flat vector; index 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    params: TreeParams,
    nodes: Vec<Node>,
    depth: usize,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    sse: f64,
}

impl DecisionTreeRegressor {
    /// Fit a tree on every row of `data`.
    pub fn fit(data: &Dataset, params: TreeParams) -> Result<Self, CoreError> {
        if data.is_empty() {
            return Err(CoreError::Validation("Cannot fit a tree on zero rows".into()));
        }
        let rows = data.rows();
        let targets = data.targets();
        if rows.iter().flatten().chain(targets).any(|v| !v.is_finite()) {
            return Err(CoreError::Validation(
                "Training data contains non-finite values".into(),
            ));
        }

        let min_leaf = params.min_samples_leaf.max(1);
        let min_split = params.min_samples_split.max(2);

        let mut nodes = vec![Node::Leaf {
            value: 0.0,
            samples: 0,
        }];
        let mut depth = 0;
        let mut work: Vec<(usize, Vec<usize>, usize)> = vec![(0, (0..data.len()).collect(), 0)];

        while let Some((id, indices, level)) = work.pop() {
            depth = depth.max(level);
            let n = indices.len();
            let value = indices.iter().map(|&i| targets[i]).sum::<f64>() / n as f64;

            let first = targets[indices[0]];
            let pure = indices.iter().all(|&i| targets[i] == first);
            let depth_ok = params.max_depth.map_or(true, |max| level < max);

            let split = if !pure && depth_ok && n >= min_split && n >= 2 * min_leaf {
                best_split(rows, targets, &indices, min_leaf)
            } else {
                None
            };

            match split {
                Some(best) => {
                    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                        .iter()
                        .partition(|&&i| rows[i][best.feature] <= best.threshold);
                    let left = nodes.len();
                    let right = left + 1;
                    nodes.push(Node::Leaf {
                        value: 0.0,
                        samples: 0,
                    });
                    nodes.push(Node::Leaf {
                        value: 0.0,
                        samples: 0,
                    });
                    nodes[id] = Node::Split {
                        feature: best.feature,
                        threshold: best.threshold,
                        left,
                        right,
                        value,
                        samples: n,
                    };
                    work.push((right, right_idx, level + 1));
                    work.push((left, left_idx, level + 1));
                }
                None => nodes[id] = Node::Leaf { value, samples: n },
            }
        }

        Ok(Self {
            params,
            nodes,
            depth,
        })
    }

    /// Predict a single row.
    pub fn predict(&self, row: &FeatureRow) -> f64 {
        match &self.nodes[self.leaf_for(row).0] {
            Node::Leaf { value, .. } | Node::Split { value, .. } => *value,
        }
    }

    /// Predict every row in order.
    pub fn predict_many(&self, rows: &[FeatureRow]) -> Vec<f64> {
        rows.iter().map(|r| self.predict(r)).collect()
    }

    /// Number of nodes on the root-to-leaf path for `row`, both ends included.
    pub fn decision_path_len(&self, row: &FeatureRow) -> usize {
        self.leaf_for(row).1
    }

    /// Depth of the deepest leaf (a single-leaf tree has depth 0).
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    pub fn params(&self) -> TreeParams {
        self.params
    }

    fn leaf_for(&self, row: &FeatureRow) -> (usize, usize) {
        let mut id = 0;
        let mut visited = 1;
        while let Node::Split {
            feature,
            threshold,
            left,
            right,
            ..
        } = &self.nodes[id]
        {
            id = if row[*feature] <= *threshold {
                *left
            } else {
                *right
            };
            visited += 1;
        }
        (id, visited)
    }
}

/// Exhaustive search for the split minimising summed child SSE.
fn best_split(
    rows: &[FeatureRow],
    targets: &[f64],
    indices: &[usize],
    min_leaf: usize,
) -> Option<BestSplit> {
    let n = indices.len();
    let total_sum: f64 = indices.iter().map(|&i| targets[i]).sum();
    let total_sq: f64 = indices.iter().map(|&i| targets[i] * targets[i]).sum();

    let mut best: Option<BestSplit> = None;
    let mut sorted = indices.to_vec();

    for feature in 0..FEATURE_COUNT {
        sorted.sort_by(|&a, &b| rows[a][feature].total_cmp(&rows[b][feature]));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for pos in 0..n - 1 {
            let y = targets[sorted[pos]];
            left_sum += y;
            left_sq += y * y;

            let left_n = pos + 1;
            let right_n = n - left_n;
            if left_n < min_leaf || right_n < min_leaf {
                continue;
            }
            let here = rows[sorted[pos]][feature];
            let next = rows[sorted[pos + 1]][feature];
            if here == next {
                continue;
            }

            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / left_n as f64)
                + (right_sq - right_sum * right_sum / right_n as f64);

            if best.as_ref().map_or(true, |b| sse < b.sse) {
                let mut threshold = here + (next - here) / 2.0;
                if threshold >= next || !threshold.is_finite() {
                    threshold = here;
                }
                best = Some(BestSplit {
                    feature,
                    threshold,
                    sse,
                });
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> Dataset {
        // Target depends only on feature 0: 10 below 5.0, 20 above.
        let mut ds = Dataset::new();
        for i in 0..10 {
            let mut row = [1.0; 8];
            row[0] = i as f64;
            row[3] = (i % 3) as f64;
            ds.push(row, if i < 5 { 10.0 } else { 20.0 });
        }
        ds
    }

    #[test]
    fn learns_a_step_function_exactly() {
        let tree = DecisionTreeRegressor::fit(&step_data(), TreeParams::default()).unwrap();
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.leaf_count(), 2);

        let mut low = [1.0; 8];
        low[0] = 2.0;
        let mut high = [1.0; 8];
        high[0] = 8.0;
        assert_eq!(tree.predict(&low), 10.0);
        assert_eq!(tree.predict(&high), 20.0);
        assert_eq!(tree.decision_path_len(&low), 2);
    }

    #[test]
    fn threshold_sits_between_observed_values() {
        let tree = DecisionTreeRegressor::fit(&step_data(), TreeParams::default()).unwrap();
        let mut boundary = [1.0; 8];
        boundary[0] = 4.5;
        assert_eq!(tree.predict(&boundary), 10.0);
        boundary[0] = 4.51;
        assert_eq!(tree.predict(&boundary), 20.0);
    }

    #[test]
    fn constant_target_gives_single_leaf() {
        let mut ds = Dataset::new();
        for i in 0..5 {
            ds.push([i as f64; 8], 3.0);
        }
        let tree = DecisionTreeRegressor::fit(&ds, TreeParams::default()).unwrap();
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.predict(&[100.0; 8]), 3.0);
    }

    #[test]
    fn max_depth_limits_growth() {
        let mut ds = Dataset::new();
        for i in 0..64 {
            ds.push([i as f64; 8], i as f64);
        }
        let params = TreeParams {
            max_depth: Some(3),
            ..TreeParams::default()
        };
        let tree = DecisionTreeRegressor::fit(&ds, params).unwrap();
        assert_eq!(tree.depth(), 3);
        assert!(tree.leaf_count() <= 8);
    }

    #[test]
    fn fully_grown_tree_memorises_distinct_rows() {
        let mut ds = Dataset::new();
        for i in 0..40 {
            let x = i as f64;
            ds.push([x, x * 0.5, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0], (x * 1.7).sin());
        }
        let tree = DecisionTreeRegressor::fit(&ds, TreeParams::default()).unwrap();
        for (row, target) in ds.rows().iter().zip(ds.targets()) {
            assert_eq!(tree.predict(row), *target);
        }
    }

    #[test]
    fn identical_rows_with_different_targets_average() {
        let mut ds = Dataset::new();
        ds.push([1.0; 8], 1.0);
        ds.push([1.0; 8], 3.0);
        let tree = DecisionTreeRegressor::fit(&ds, TreeParams::default()).unwrap();
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.predict(&[1.0; 8]), 2.0);
    }

    #[test]
    fn fitting_is_deterministic() {
        let a = DecisionTreeRegressor::fit(&step_data(), TreeParams::default()).unwrap();
        let b = DecisionTreeRegressor::fit(&step_data(), TreeParams::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn serde_round_trip_preserves_predictions() {
        let tree = DecisionTreeRegressor::fit(&step_data(), TreeParams::default()).unwrap();
        let json = serde_json::to_string(&tree).unwrap();
        let restored: DecisionTreeRegressor = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, tree);
    }

    #[test]
    fn empty_and_non_finite_data_rejected() {
        assert!(DecisionTreeRegressor::fit(&Dataset::new(), TreeParams::default()).is_err());

        let mut ds = Dataset::new();
        ds.push([f64::NAN; 8], 1.0);
        ds.push([1.0; 8], 2.0);
        assert!(DecisionTreeRegressor::fit(&ds, TreeParams::default()).is_err());
    }
}
