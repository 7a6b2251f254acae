//! Gradient Boosting implementation
//!
//! Binary log-loss boosting over regression trees fit to the residual
//! `y - sigmoid(log_odds)`. Row and column subsampling are drawn per round
//! from a seeded Xoshiro stream.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::decision_tree::DecisionTree;
use super::search::ParameterValue;
use crate::error::{PipelineError, Result};

/// Rows above which residuals are computed in parallel
const PARALLEL_RESIDUAL_MIN_SAMPLES: usize = 10_000;

/// Gradient Boosting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Subsample ratio for each tree
    pub subsample: f64,
    /// Column subsample ratio
    pub colsample_bytree: f64,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: Some(42),
        }
    }
}

impl GradientBoostingConfig {
    /// Build a configuration from sampled hyperparameters, starting from defaults
    pub fn from_params(params: &BTreeMap<String, ParameterValue>, random_state: u64) -> Result<Self> {
        let mut config = Self {
            random_state: Some(random_state),
            ..Self::default()
        };

        for (name, value) in params {
            match name.as_str() {
                "n_estimators" => config.n_estimators = positive_int(name, value)?,
                "max_depth" => config.max_depth = positive_int(name, value)?,
                "min_samples_leaf" => config.min_samples_leaf = positive_int(name, value)?,
                "learning_rate" => config.learning_rate = value.as_float(),
                "subsample" => config.subsample = value.as_float(),
                "colsample_bytree" => config.colsample_bytree = value.as_float(),
                other => {
                    return Err(PipelineError::Config(format!(
                        "unknown gradient boosting hyperparameter '{}'",
                        other
                    )))
                }
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 || self.max_depth == 0 {
            return Err(PipelineError::Config(
                "n_estimators and max_depth must be positive".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0) {
            return Err(PipelineError::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        for (name, ratio) in [("subsample", self.subsample), ("colsample_bytree", self.colsample_bytree)] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(PipelineError::Config(format!(
                    "{} must be in (0, 1], got {}",
                    name, ratio
                )));
            }
        }
        Ok(())
    }
}

fn positive_int(name: &str, value: &ParameterValue) -> Result<usize> {
    let v = value.as_int();
    if v < 1 {
        return Err(PipelineError::Config(format!("{} must be at least 1, got {}", name, v)));
    }
    Ok(v as usize)
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Gradient Boosting Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTree>,
    col_indices_per_tree: Vec<Vec<usize>>,
    initial_log_odds: f64,
    n_features: usize,
    feature_importances: Vec<f64>,
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            col_indices_per_tree: Vec::new(),
            initial_log_odds: 0.0,
            n_features: 0,
            feature_importances: Vec::new(),
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    /// Fit binary classification; labels must be 0 or 1
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
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
                "Cannot fit gradient boosting on an empty matrix".to_string(),
            ));
        }
        if let Some(bad) = y.iter().find(|&&v| v != 0.0 && v != 1.0) {
            return Err(PipelineError::Validation(format!(
                "binary labels must be 0 or 1, found {}",
                bad
            )));
        }

        let p = y.mean().unwrap_or(0.5).clamp(1e-10, 1.0 - 1e-10);
        self.initial_log_odds = (p / (1.0 - p)).ln();
        self.n_features = n_features;
        self.trees.clear();
        self.col_indices_per_tree.clear();
        self.feature_importances = vec![0.0; n_features];

        let mut log_odds = Array1::from_elem(n_samples, self.initial_log_odds);
        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        for _ in 0..self.config.n_estimators {
            let residuals: Array1<f64> = if n_samples > PARALLEL_RESIDUAL_MIN_SAMPLES {
                let lo = &log_odds;
                Array1::from_vec(
                    (0..n_samples)
                        .into_par_iter()
                        .map(|i| y[i] - sigmoid(lo[i]))
                        .collect(),
                )
            } else {
                y.iter().zip(log_odds.iter()).map(|(yi, lo)| yi - sigmoid(*lo)).collect()
            };

            let sample_indices = sample_sorted(n_samples, self.config.subsample, &mut rng);
            let col_indices = sample_sorted(n_features, self.config.colsample_bytree, &mut rng);

            let x_cols = x.select(Axis(1), &col_indices);
            let x_sub = x_cols.select(Axis(0), &sample_indices);
            let y_sub: Array1<f64> = sample_indices.iter().map(|&i| residuals[i]).collect();

            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(self.config.max_depth)
                .with_min_samples_leaf(self.config.min_samples_leaf);
            tree.fit(&x_sub, &y_sub)?;

            // Every row moves, not only the ones the tree was fit on
            let tree_pred = tree.predict(&x_cols)?;
            log_odds.scaled_add(self.config.learning_rate, &tree_pred);

            if let Some(tree_importance) = tree.feature_importances() {
                for (j, &col_idx) in col_indices.iter().enumerate() {
                    self.feature_importances[col_idx] += tree_importance[j];
                }
            }

            self.trees.push(tree);
            self.col_indices_per_tree.push(col_indices);
        }

        let total: f64 = self.feature_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= total;
            }
        }

        Ok(())
    }

    /// Predict class labels (threshold 0.5)
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let probs = self.predict_proba(x)?;
        Ok(probs.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    /// Probability of the positive class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(PipelineError::Shape {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let mut log_odds = Array1::from_elem(x.nrows(), self.initial_log_odds);
        for (tree, col_indices) in self.trees.iter().zip(self.col_indices_per_tree.iter()) {
            let x_sub = x.select(Axis(1), col_indices);
            log_odds.scaled_add(self.config.learning_rate, &tree.predict(&x_sub)?);
        }

        Ok(log_odds.mapv(sigmoid))
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

fn sample_sorted(n: usize, ratio: f64, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    if ratio >= 1.0 {
        return indices;
    }
    let sample_size = ((n as f64) * ratio).ceil().max(1.0) as usize;
    indices.shuffle(rng);
    indices.truncate(sample_size);
    indices.sort_unstable();
    indices
}
