//! SMOTE oversampling
//!
//! Every class below the majority count is topped up with synthetic rows
//! interpolated between a randomly chosen member and one of its k nearest
//! same-class neighbours.

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use tracing::debug;

/// Result of resampling
#[derive(Debug, Clone)]
pub struct ResampleResult {
    /// Original rows followed by synthetic rows
    pub x: Array2<f64>,
    pub y: Array1<i64>,
    /// Synthetic rows generated per class, in ascending class order
    pub n_synthetic: BTreeMap<i64, usize>,
}

/// Trait for samplers
pub trait Sampler: Send + Sync {
    /// Fit the sampler on data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<()>;

    /// Resample data
    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult>;

    /// Fit and resample in one step
    fn fit_resample(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult> {
        self.fit(x, y)?;
        self.resample(x, y)
    }
}

/// Class distribution, ordered by label
pub fn class_counts(y: &Array1<i64>) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    for &label in y.iter() {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}

fn class_indices(y: &Array1<i64>) -> BTreeMap<i64, Vec<usize>> {
    let mut indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, &label) in y.iter().enumerate() {
        indices.entry(label).or_default().push(i);
    }
    indices
}

/// Ordered float for BinaryHeap-based partial sort
#[derive(Debug, Clone, Copy)]
struct DistIdx(f64, usize);

impl PartialEq for DistIdx {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for DistIdx {}
impl PartialOrd for DistIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0).then(self.1.cmp(&other.1))
    }
}

/// SMOTE (Synthetic Minority Over-sampling Technique)
#[derive(Debug, Clone)]
pub struct SMOTE {
    k_neighbors: usize,
    seed: u64,
    target_counts: Option<BTreeMap<i64, usize>>,
}

impl Default for SMOTE {
    fn default() -> Self {
        Self::new()
    }
}

impl SMOTE {
    pub fn new() -> Self {
        Self {
            k_neighbors: 5,
            seed: 42,
            target_counts: None,
        }
    }

    /// Set number of neighbors
    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k.max(1);
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn squared_distance(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
        a.iter().zip(b.iter()).map(|(ai, bi)| (ai - bi).powi(2)).sum()
    }

    /// k nearest members of `members` to `members[pos]`, excluding itself by position
    fn find_neighbors(x: &Array2<f64>, members: &[usize], pos: usize, k: usize) -> Vec<usize> {
        let point = x.row(members[pos]);
        let mut heap: BinaryHeap<DistIdx> = BinaryHeap::with_capacity(k + 1);

        for (j, &other) in members.iter().enumerate() {
            if j == pos {
                continue;
            }
            let candidate = DistIdx(Self::squared_distance(&point, &x.row(other)), j);
            if heap.len() < k {
                heap.push(candidate);
            } else if heap.peek().map_or(false, |worst| candidate < *worst) {
                heap.pop();
                heap.push(candidate);
            }
        }

        let mut neighbors: Vec<usize> = heap.into_sorted_vec().into_iter().map(|DistIdx(_, j)| j).collect();
        neighbors.truncate(k);
        neighbors
    }
}

impl Sampler for SMOTE {
    fn fit(&mut self, _x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        let counts = class_counts(y);
        if counts.len() < 2 {
            return Err(PipelineError::Validation(format!(
                "SMOTE needs at least 2 classes, found {}",
                counts.len()
            )));
        }

        let max_count = counts.values().copied().max().unwrap_or(0);
        self.target_counts = Some(counts.keys().map(|&class| (class, max_count)).collect());
        Ok(())
    }

    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult> {
        let targets = self
            .target_counts
            .as_ref()
            .ok_or_else(|| PipelineError::Validation("SMOTE not fitted".to_string()))?;
        if x.nrows() != y.len() {
            return Err(PipelineError::Shape {
                expected: format!("{} labels", x.nrows()),
                actual: format!("{} labels", y.len()),
            });
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let indices = class_indices(y);
        let n_features = x.ncols();

        let mut synthetic_x: Vec<f64> = Vec::new();
        let mut synthetic_y: Vec<i64> = Vec::new();
        let mut n_synthetic = BTreeMap::new();

        for (&class, &target_count) in targets {
            let members = indices.get(&class).map(Vec::as_slice).unwrap_or(&[]);
            let n_to_generate = target_count.saturating_sub(members.len());
            n_synthetic.insert(class, n_to_generate);

            if n_to_generate == 0 || members.is_empty() {
                continue;
            }

            let k = self.k_neighbors.min(members.len() - 1);
            let neighbors: Vec<Vec<usize>> = (0..members.len())
                .into_par_iter()
                .map(|pos| Self::find_neighbors(x, members, pos, k))
                .collect();

            debug!(class, n_to_generate, k, "Generating synthetic rows");

            for _ in 0..n_to_generate {
                let pos = rng.gen_range(0..members.len());
                let sample = x.row(members[pos]);

                // A lone member has no neighbour to move towards
                match neighbors[pos].choose(&mut rng) {
                    Some(&npos) => {
                        let neighbor = x.row(members[npos]);
                        let gap: f64 = rng.gen();
                        synthetic_x.extend(sample.iter().zip(neighbor.iter()).map(|(&p, &n)| p + gap * (n - p)));
                    }
                    None => synthetic_x.extend(sample.iter().copied()),
                }
                synthetic_y.push(class);
            }
        }

        let n_original = x.nrows();
        let n_total = n_original + synthetic_y.len();
        let result_x = Array2::from_shape_fn((n_total, n_features), |(i, j)| {
            if i < n_original {
                x[[i, j]]
            } else {
                synthetic_x[(i - n_original) * n_features + j]
            }
        });
        let result_y: Array1<i64> = y.iter().copied().chain(synthetic_y).collect();

        Ok(ResampleResult {
            x: result_x,
            y: result_y,
            n_synthetic,
        })
    }
}
