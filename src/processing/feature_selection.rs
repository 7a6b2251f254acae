//! Importance-based feature selection
//!
//! A random forest is fit on the balanced training matrix and features are
//! ranked by impurity-decrease importance. Ties keep the original column order.

use crate::error::{PipelineError, Result};
use crate::training::random_forest::RandomForest;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Top-N selector over random forest importances
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSelector {
    n_features_to_select: usize,
    n_estimators: usize,
    random_state: u64,
    selected_features: Option<Vec<usize>>,
    feature_scores: Option<Vec<f64>>,
    feature_names: Option<Vec<String>>,
}

impl FeatureSelector {
    pub fn new(n_features_to_select: usize) -> Self {
        Self {
            n_features_to_select,
            n_estimators: 100,
            random_state: 42,
            selected_features: None,
            feature_scores: None,
            feature_names: None,
        }
    }

    pub fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators.max(1);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = Some(names);
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_features = x.ncols();
        if self.n_features_to_select == 0 || self.n_features_to_select > n_features {
            return Err(PipelineError::Config(format!(
                "top_n_feature ({}) must be between 1 and the number of available features ({})",
                self.n_features_to_select, n_features
            )));
        }
        if let Some(names) = &self.feature_names {
            if names.len() != n_features {
                return Err(PipelineError::Shape {
                    expected: format!("{} feature names", n_features),
                    actual: format!("{} feature names", names.len()),
                });
            }
        }

        let mut forest = RandomForest::new_classifier(self.n_estimators).with_random_state(self.random_state);
        forest.fit(x, y)?;
        let scores: Vec<f64> = forest
            .feature_importances()
            .ok_or(PipelineError::ModelNotFitted)?
            .to_vec();

        // sort_by is stable, so equal scores stay in column order
        let mut ranking: Vec<usize> = (0..n_features).collect();
        ranking.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
        ranking.truncate(self.n_features_to_select);

        self.feature_scores = Some(scores);
        self.selected_features = Some(ranking);
        Ok(())
    }

    /// Selected column indices, most important first
    pub fn selected_indices(&self) -> Option<&[usize]> {
        self.selected_features.as_deref()
    }

    pub fn scores(&self) -> Option<&[f64]> {
        self.feature_scores.as_deref()
    }

    /// Selected column names, most important first
    pub fn selected_names(&self) -> Option<Vec<String>> {
        let names = self.feature_names.as_ref()?;
        let selected = self.selected_features.as_ref()?;
        Some(selected.iter().map(|&i| names[i].clone()).collect())
    }
}
