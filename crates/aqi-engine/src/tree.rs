//! Regression tree (CART, variance reduction)
//!
//! Built greedily: at each node every feature is scanned in sorted order and
//! the split minimising the summed squared error of the two children is
//! taken. Operates on raw, unscaled features.

use crate::error::{EngineError, Result};
use crate::models::NUM_FEATURES;
use serde::{Deserialize, Serialize};

/// Default maximum depth; bounds both overfitting and tree size
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Growth limits for the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Maximum depth (root is depth 0)
    pub max_depth: usize,
    /// Minimum samples a node needs before it may be split
    pub min_samples_split: usize,
    /// Minimum samples each child of a split must keep.
    ///
    /// Defaults to 5 rather than the customary 1, so leaves average a few
    /// rows instead of memorising single noisy labels.
    pub min_samples_leaf: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            min_samples_split: 2,
            min_samples_leaf: 5,
        }
    }
}

/// A node of the fitted tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    /// Terminal node predicting the mean label of its training rows
    Leaf { value: f64, samples: usize },
    /// Rows with `x[feature] <= threshold` go left, the rest go right
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    /// Depth of the subtree; a leaf has depth 0
    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.leaf_count() + right.leaf_count(),
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        match self {
            TreeNode::Leaf { value, .. } if !value.is_finite() => {
                Err("leaf holds a non-finite value".to_string())
            }
            TreeNode::Leaf { .. } => Ok(()),
            TreeNode::Split { feature, .. } if *feature >= NUM_FEATURES => {
                Err(format!("split on unknown feature index {}", feature))
            }
            TreeNode::Split { threshold, .. } if !threshold.is_finite() => {
                Err("split threshold is not finite".to_string())
            }
            TreeNode::Split { left, right, .. } => {
                left.validate()?;
                right.validate()
            }
        }
    }
}

/// Fitted regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub config: TreeConfig,
    pub root: TreeNode,
}

impl RegressionTree {
    pub fn fit(x: &[[f64; NUM_FEATURES]], y: &[f64], config: TreeConfig) -> Result<Self> {
        if x.len() != y.len() {
            return Err(EngineError::TrainingFailed(format!(
                "{} rows but {} targets",
                x.len(),
                y.len()
            )));
        }
        if x.is_empty() {
            return Err(EngineError::TrainingFailed(
                "cannot fit a tree with zero samples".to_string(),
            ));
        }

        let config = TreeConfig {
            min_samples_split: config.min_samples_split.max(2),
            min_samples_leaf: config.min_samples_leaf.max(1),
            ..config
        };
        let mut indices: Vec<usize> = (0..x.len()).collect();
        let builder = Builder { x, y, config };
        let root = builder.build(&mut indices, 0);
        Ok(Self { config, root })
    }

    /// Walk from the root to a leaf and return its value
    pub fn predict(&self, x: &[f64; NUM_FEATURES]) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if x[*feature] <= *threshold {
                        left.as_ref()
                    } else {
                        right.as_ref()
                    };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    pub fn leaf_count(&self) -> usize {
        self.root.leaf_count()
    }

    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        self.root.validate()
    }
}

struct Builder<'a> {
    x: &'a [[f64; NUM_FEATURES]],
    y: &'a [f64],
    config: TreeConfig,
}

/// Best split found for a node
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    sse: f64,
}

impl Builder<'_> {
    fn build(&self, indices: &mut [usize], depth: usize) -> TreeNode {
        let n = indices.len();
        let (sum, sum_sq) = indices.iter().fold((0.0, 0.0), |(s, sq), &i| {
            (s + self.y[i], sq + self.y[i] * self.y[i])
        });
        let mean = sum / n as f64;
        let node_sse = (sum_sq - sum * sum / n as f64).max(0.0);

        let leaf = TreeNode::Leaf {
            value: mean,
            samples: n,
        };
        if n < self.config.min_samples_split
            || n < 2 * self.config.min_samples_leaf
            || depth >= self.config.max_depth
            || node_sse / (n as f64) < 1e-10
        {
            return leaf;
        }

        let Some(split) = self.best_split(indices) else {
            return leaf;
        };
        if node_sse - split.sse <= 1e-12 * node_sse.max(1.0) {
            return leaf;
        }

        let mid = partition(indices, |i| self.x[i][split.feature] <= split.threshold);
        let (left_idx, right_idx) = indices.split_at_mut(mid);
        if left_idx.is_empty() || right_idx.is_empty() {
            return leaf;
        }

        TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(self.build(left_idx, depth + 1)),
            right: Box::new(self.build(right_idx, depth + 1)),
        }
    }

    fn best_split(&self, indices: &[usize]) -> Option<SplitCandidate> {
        let n = indices.len();
        let min_leaf = self.config.min_samples_leaf;
        let mut best: Option<SplitCandidate> = None;
        let mut sorted = indices.to_vec();

        for feature in 0..NUM_FEATURES {
            sorted.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

            let total_sum: f64 = sorted.iter().map(|&i| self.y[i]).sum();
            let total_sq: f64 = sorted.iter().map(|&i| self.y[i] * self.y[i]).sum();
            let mut left_sum = 0.0;
            let mut left_sq = 0.0;

            // `k` rows go left.
            for k in 1..n {
                let prev = sorted[k - 1];
                left_sum += self.y[prev];
                left_sq += self.y[prev] * self.y[prev];

                if k < min_leaf || n - k < min_leaf {
                    continue;
                }
                let lo = self.x[prev][feature];
                let hi = self.x[sorted[k]][feature];
                if lo >= hi {
                    continue;
                }

                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let left_n = k as f64;
                let right_n = (n - k) as f64;
                let sse = (left_sq - left_sum * left_sum / left_n)
                    + (right_sq - right_sum * right_sum / right_n);

                if best.as_ref().map_or(true, |b| sse < b.sse) {
                    let mut threshold = lo + (hi - lo) / 2.0;
                    if threshold >= hi {
                        threshold = lo;
                    }
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        sse,
                    });
                }
            }
        }
        best
    }
}

/// Reorder so that elements satisfying `pred` come first; returns their count
fn partition(indices: &mut [usize], pred: impl Fn(usize) -> bool) -> usize {
    let mut mid = 0;
    for i in 0..indices.len() {
        if pred(indices[i]) {
            indices.swap(i, mid);
            mid += 1;
        }
    }
    mid
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(v: f64) -> [f64; NUM_FEATURES] {
        let mut r = [0.0; NUM_FEATURES];
        r[2] = v;
        r
    }

    fn step_data() -> (Vec<[f64; NUM_FEATURES]>, Vec<f64>) {
        let x: Vec<_> = (0..40).map(|i| row(i as f64)).collect();
        let y: Vec<_> = (0..40).map(|i| if i < 20 { 10.0 } else { 90.0 }).collect();
        (x, y)
    }

    #[test]
    fn test_learns_single_step() {
        let (x, y) = step_data();
        let tree = RegressionTree::fit(&x, &y, TreeConfig::default()).unwrap();

        match &tree.root {
            TreeNode::Split {
                feature, threshold, ..
            } => {
                assert_eq!(*feature, 2);
                assert!((*threshold - 19.5).abs() < 1e-12);
            }
            other => panic!("expected a split at the root, got {:?}", other),
        }
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict(&row(3.0)), 10.0);
        assert_eq!(tree.predict(&row(35.0)), 90.0);
        assert_eq!(tree.predict(&row(19.5)), 10.0);
    }

    #[test]
    fn test_constant_target_is_single_leaf() {
        let x: Vec<_> = (0..30).map(|i| row(i as f64)).collect();
        let y = vec![7.0; 30];
        let tree = RegressionTree::fit(&x, &y, TreeConfig::default()).unwrap();
        assert_eq!(tree.root, TreeNode::Leaf { value: 7.0, samples: 30 });
    }

    #[test]
    fn test_max_depth_respected() {
        let ds = crate::synth::generate(600, 5).unwrap();
        for max_depth in [0, 1, 3, 6] {
            let config = TreeConfig {
                max_depth,
                ..TreeConfig::default()
            };
            let tree = RegressionTree::fit(ds.features(), ds.labels(), config).unwrap();
            assert!(tree.depth() <= max_depth);
            assert!(tree.leaf_count() <= 1 << max_depth);
        }
    }

    #[test]
    fn test_default_config() {
        let config = TreeConfig::default();
        assert_eq!(config.max_depth, 10);
        assert_eq!(config.min_samples_split, 2);
        assert_eq!(config.min_samples_leaf, 5);
    }

    #[test]
    fn test_min_samples_leaf_respected() {
        let ds = crate::synth::generate(400, 8).unwrap();
        let config = TreeConfig {
            max_depth: 12,
            min_samples_split: 2,
            min_samples_leaf: 7,
        };
        let tree = RegressionTree::fit(ds.features(), ds.labels(), config).unwrap();

        fn check(node: &TreeNode, min: usize) {
            match node {
                TreeNode::Leaf { samples, .. } => assert!(*samples >= min),
                TreeNode::Split { left, right, .. } => {
                    check(left, min);
                    check(right, min);
                }
            }
        }
        check(&tree.root, 7);
    }

    #[test]
    fn test_predictions_within_label_range() {
        let ds = crate::synth::generate(300, 2).unwrap();
        let tree = RegressionTree::fit(ds.features(), ds.labels(), TreeConfig::default()).unwrap();
        let lo = ds.labels().iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = ds.labels().iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        for r in ds.features() {
            let p = tree.predict(r);
            assert!(p >= lo && p <= hi);
        }
    }

    #[test]
    fn test_serde_shape_and_validation() {
        let (x, y) = step_data();
        let tree = RegressionTree::fit(&x, &y, TreeConfig::default()).unwrap();
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["root"]["kind"], "split");
        assert_eq!(json["root"]["left"]["kind"], "leaf");

        let bad = RegressionTree {
            config: TreeConfig::default(),
            root: TreeNode::Split {
                feature: 12,
                threshold: 1.0,
                left: Box::new(TreeNode::Leaf { value: 1.0, samples: 1 }),
                right: Box::new(TreeNode::Leaf { value: 2.0, samples: 1 }),
            },
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(RegressionTree::fit(&[], &[], TreeConfig::default()).is_err());
    }
}
