//! Decision tree implementation
//!
//! CART-style binary trees used as base learners by the random forest
//! (classification, Gini) and by gradient boosting (regression on residuals, MSE).

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Nodes smaller than this scan features sequentially
const PARALLEL_SPLIT_MIN_SAMPLES: usize = 2048;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf {
        value: f64,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Mean squared error (regression)
    MSE,
}

/// Running statistics of one side of a candidate split
#[derive(Debug, Clone)]
struct SplitStats {
    count: usize,
    sum: f64,
    sq_sum: f64,
    class_counts: Vec<usize>,
}

impl SplitStats {
    fn new(n_classes: usize) -> Self {
        Self {
            count: 0,
            sum: 0.0,
            sq_sum: 0.0,
            class_counts: vec![0; n_classes],
        }
    }

    fn add(&mut self, y: f64, class: Option<usize>) {
        self.count += 1;
        self.sum += y;
        self.sq_sum += y * y;
        if let Some(c) = class {
            self.class_counts[c] += 1;
        }
    }

    fn remove(&mut self, y: f64, class: Option<usize>) {
        self.count -= 1;
        self.sum -= y;
        self.sq_sum -= y * y;
        if let Some(c) = class {
            self.class_counts[c] -= 1;
        }
    }

    fn impurity(&self, criterion: Criterion) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        match criterion {
            Criterion::Gini => {
                1.0 - self
                    .class_counts
                    .iter()
                    .map(|&c| (c as f64 / n).powi(2))
                    .sum::<f64>()
            }
            Criterion::MSE => (self.sq_sum / n - (self.sum / n).powi(2)).max(0.0),
        }
    }
}

/// Best split found for a node: (feature, threshold, impurity decrease)
type Candidate = (usize, f64, f64);

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features sampled at each node (all when `None`)
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Seed for per-node feature sampling
    pub random_state: u64,
    /// Number of features
    n_features: usize,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
    /// Is classification task
    is_classification: bool,
    /// Classes (for classification)
    classes: Vec<f64>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: 0,
            n_features: 0,
            feature_importances: None,
            is_classification: true,
            classes: Vec::new(),
        }
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::MSE,
            is_classification: false,
            ..Self::new_classifier()
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Set number of features considered per split
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    /// Set seed for feature sampling
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(PipelineError::Shape {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 || n_features == 0 {
            return Err(PipelineError::Validation(
                "Cannot fit a tree on an empty matrix".to_string(),
            ));
        }

        self.n_features = n_features;

        // Class index per sample keeps Gini bookkeeping in flat vectors
        let class_of: Option<Vec<usize>> = if self.is_classification {
            let mut classes: Vec<f64> = y.iter().copied().collect();
            classes.sort_by(|a, b| a.total_cmp(b));
            classes.dedup();
            let index = y
                .iter()
                .map(|v| classes.partition_point(|c| c < v))
                .collect();
            self.classes = classes;
            Some(index)
        } else {
            None
        };

        let mut importances = vec![0.0; n_features];
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let indices: Vec<usize> = (0..n_samples).collect();
        let root = self.build_tree(x, y, class_of.as_deref(), &indices, 0, &mut importances, &mut rng);
        self.root = Some(root);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        class_of: Option<&[usize]>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let node_stats = self.node_stats(y, class_of, indices);
        let leaf_value = self.leaf_value(&node_stats);

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || node_stats.impurity(self.criterion) <= 1e-12;

        if should_stop {
            return TreeNode::Leaf { value: leaf_value, n_samples };
        }

        let features = self.sample_features(rng);
        let Some((feature_idx, threshold, gain)) =
            self.find_best_split(x, y, class_of, indices, &features, &node_stats)
        else {
            return TreeNode::Leaf { value: leaf_value, n_samples };
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature_idx]] <= threshold);

        importances[feature_idx] += n_samples as f64 * gain;

        let left = Box::new(self.build_tree(x, y, class_of, &left_indices, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(x, y, class_of, &right_indices, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            n_samples,
            impurity: node_stats.impurity(self.criterion),
        }
    }

    fn node_stats(&self, y: &Array1<f64>, class_of: Option<&[usize]>, indices: &[usize]) -> SplitStats {
        let mut stats = SplitStats::new(self.classes.len());
        for &i in indices {
            stats.add(y[i], class_of.map(|c| c[i]));
        }
        stats
    }

    fn sample_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        match self.max_features {
            Some(k) if k < self.n_features => {
                let mut features = sample(rng, self.n_features, k).into_vec();
                features.sort_unstable();
                features
            }
            _ => (0..self.n_features).collect(),
        }
    }

    /// Sweep each candidate feature in sorted order, moving samples from the
    /// right side to the left and scoring every boundary between distinct values.
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        class_of: Option<&[usize]>,
        indices: &[usize],
        features: &[usize],
        node_stats: &SplitStats,
    ) -> Option<Candidate> {
        let parent_impurity = node_stats.impurity(self.criterion);
        let n = indices.len() as f64;

        let scan = |&feature_idx: &usize| -> Option<Candidate> {
            let mut order: Vec<usize> = indices.to_vec();
            order.sort_by(|&a, &b| x[[a, feature_idx]].total_cmp(&x[[b, feature_idx]]));

            let mut left = SplitStats::new(self.classes.len());
            let mut right = node_stats.clone();
            let mut best: Option<(f64, f64)> = None;

            for pos in 0..order.len() - 1 {
                let i = order[pos];
                let class = class_of.map(|c| c[i]);
                left.add(y[i], class);
                right.remove(y[i], class);

                let current = x[[i, feature_idx]];
                let next = x[[order[pos + 1], feature_idx]];
                if next <= current {
                    continue;
                }
                if left.count < self.min_samples_leaf || right.count < self.min_samples_leaf {
                    continue;
                }

                let weighted = (left.count as f64 * left.impurity(self.criterion)
                    + right.count as f64 * right.impurity(self.criterion))
                    / n;
                let gain = parent_impurity - weighted;
                if gain > best.map_or(1e-12, |(g, _)| g) {
                    best = Some((gain, (current + next) / 2.0));
                }
            }

            best.map(|(gain, threshold)| (feature_idx, threshold, gain))
        };

        let results: Vec<Option<Candidate>> = if indices.len() >= PARALLEL_SPLIT_MIN_SAMPLES {
            features.par_iter().map(scan).collect()
        } else {
            features.iter().map(scan).collect()
        };

        // First feature wins ties so results do not depend on scheduling
        results.into_iter().flatten().fold(None, |best: Option<Candidate>, cand| match best {
            Some(b) if b.2 >= cand.2 => Some(b),
            _ => Some(cand),
        })
    }

    fn leaf_value(&self, stats: &SplitStats) -> f64 {
        if stats.count == 0 {
            return 0.0;
        }
        if self.is_classification {
            // Majority class, lowest label on ties
            let mut best = 0;
            for (c, &count) in stats.class_counts.iter().enumerate() {
                if count > stats.class_counts[best] {
                    best = c;
                }
            }
            self.classes.get(best).copied().unwrap_or(0.0)
        } else {
            stats.sum / stats.count as f64
        }
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(PipelineError::ModelNotFitted)?;

        if x.ncols() != self.n_features {
            return Err(PipelineError::Shape {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        Ok(x.rows()
            .into_iter()
            .map(|row| Self::predict_sample(root, &row))
            .collect())
    }

    fn predict_sample(node: &TreeNode, row: &ArrayView1<f64>) -> f64 {
        let mut node = node;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if row[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_simple() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        assert_eq!(predictions, y);
    }

    #[test]
    fn test_regressor_simple() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut tree = DecisionTree::new_regressor();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        let mse: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / y.len() as f64;

        assert!(mse < 1.0, "MSE too high: {}", mse);
    }

    #[test]
    fn test_max_depth() {
        // alternating labels need a split per row to fit exactly
        let x = Array2::from_shape_fn((8, 1), |(i, _)| (i + 1) as f64);
        let y: Array1<f64> = (0..8).map(|i| (i % 2) as f64).collect();
        let accuracy = |tree: &DecisionTree| {
            let predictions = tree.predict(&x).unwrap();
            predictions.iter().zip(y.iter()).filter(|(p, t)| p == t).count() as f64 / 8.0
        };

        let mut stump = DecisionTree::new_classifier().with_max_depth(1);
        stump.fit(&x, &y).unwrap();
        assert!(accuracy(&stump) < 1.0);

        let mut full = DecisionTree::new_classifier();
        full.fit(&x, &y).unwrap();
        assert_eq!(accuracy(&full), 1.0);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert!((importances[0] - 1.0).abs() < 1e-12);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_predict_before_fit() {
        let tree = DecisionTree::new_regressor();
        let x = array![[1.0]];
        assert!(matches!(tree.predict(&x), Err(PipelineError::ModelNotFitted)));
    }

    #[test]
    fn test_feature_sampling_is_seeded() {
        let x = Array2::from_shape_fn((60, 4), |(i, j)| ((i * (j + 3)) % 11) as f64);
        let y: Array1<f64> = (0..60).map(|i| if (i * 7) % 11 > 5 { 1.0 } else { 0.0 }).collect();

        let mut a = DecisionTree::new_classifier().with_max_features(2).with_random_state(7);
        let mut b = DecisionTree::new_classifier().with_max_features(2).with_random_state(7);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
        assert_eq!(a.feature_importances(), b.feature_importances());
    }
}
