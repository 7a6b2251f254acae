//! Pipeline configuration
//!
//! The configuration is a YAML document with three sections:
//! - `data_ingestion` - where the raw bookings file lives and how it is split
//! - `data_processing` - column roles, skew threshold and feature count
//! - `model_training` - randomized search settings (optional, has defaults)

mod paths;

pub use paths::ArtifactPaths;

use crate::error::{PipelineError, Result};
use crate::training::search::{ParamDistribution, Scoring};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::info;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub data_ingestion: DataIngestionConfig,
    pub data_processing: DataProcessingConfig,
    #[serde(default)]
    pub model_training: ModelTrainingConfig,
}

/// Raw data acquisition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataIngestionConfig {
    pub bucket_name: String,
    pub bucket_file_name: String,
    /// Fraction of rows assigned to the training partition
    pub train_ratio: f64,
    #[serde(default = "default_random_state")]
    pub random_state: u64,
    /// Base URL of the object store
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

/// Data processing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataProcessingConfig {
    pub categorical_columns: Vec<String>,
    pub numerical_columns: Vec<String>,
    pub skewness_threshold: f64,
    pub top_n_feature: usize,
    #[serde(default = "default_label_column")]
    pub label_column: String,
    /// Non-predictive columns removed before anything else
    #[serde(default = "default_identifier_columns")]
    pub identifier_columns: Vec<String>,
    /// Oversample the test partition as well as the training partition
    #[serde(default = "default_true")]
    pub balance_test: bool,
    #[serde(default = "default_random_state")]
    pub random_state: u64,
    #[serde(default = "default_smote_k")]
    pub smote_k_neighbors: usize,
    /// Trees in the auxiliary forest used to rank features
    #[serde(default = "default_selector_estimators")]
    pub selector_estimators: usize,
}

/// Hyperparameter search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelTrainingConfig {
    #[serde(default = "default_n_iter")]
    pub n_iter: usize,
    #[serde(default = "default_cv_folds")]
    pub cv_folds: usize,
    #[serde(default)]
    pub scoring: Scoring,
    #[serde(default = "default_random_state")]
    pub random_state: u64,
    /// Worker threads for candidate scoring, 0 uses every core
    #[serde(default)]
    pub n_jobs: usize,
    #[serde(default = "default_search_space")]
    pub search_space: BTreeMap<String, ParamDistribution>,
}

impl Default for ModelTrainingConfig {
    fn default() -> Self {
        Self {
            n_iter: default_n_iter(),
            cv_folds: default_cv_folds(),
            scoring: Scoring::default(),
            random_state: default_random_state(),
            n_jobs: 0,
            search_space: default_search_space(),
        }
    }
}

fn default_random_state() -> u64 {
    42
}

fn default_endpoint() -> String {
    "https://storage.googleapis.com".to_string()
}

fn default_label_column() -> String {
    "booking_status".to_string()
}

fn default_identifier_columns() -> Vec<String> {
    vec!["Unnamed: 0".to_string(), "Booking_ID".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_smote_k() -> usize {
    5
}

fn default_selector_estimators() -> usize {
    100
}

fn default_n_iter() -> usize {
    4
}

fn default_cv_folds() -> usize {
    2
}

fn default_search_space() -> BTreeMap<String, ParamDistribution> {
    let mut space = BTreeMap::new();
    space.insert("n_estimators".to_string(), ParamDistribution::Int { low: 50, high: 200 });
    space.insert("max_depth".to_string(), ParamDistribution::Int { low: 3, high: 8 });
    space.insert("learning_rate".to_string(), ParamDistribution::Float { low: 0.01, high: 0.2 });
    space.insert("subsample".to_string(), ParamDistribution::Float { low: 0.7, high: 1.0 });
    space
}

impl AppConfig {
    /// Read and validate a YAML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PipelineError::Config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        let text = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        let config = Self::from_yaml(&text)?;

        info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check semantic constraints serde cannot express
    pub fn validate(&self) -> Result<()> {
        let ingestion = &self.data_ingestion;
        if !(ingestion.train_ratio > 0.0 && ingestion.train_ratio < 1.0) {
            return Err(PipelineError::Config(format!(
                "data_ingestion.train_ratio must be in (0, 1), got {}",
                ingestion.train_ratio
            )));
        }

        let processing = &self.data_processing;
        if processing.categorical_columns.is_empty() && processing.numerical_columns.is_empty() {
            return Err(PipelineError::Config(
                "data_processing needs at least one categorical or numerical column".to_string(),
            ));
        }
        if processing.top_n_feature == 0 {
            return Err(PipelineError::Config(
                "data_processing.top_n_feature must be at least 1".to_string(),
            ));
        }
        if processing.smote_k_neighbors == 0 || processing.selector_estimators == 0 {
            return Err(PipelineError::Config(
                "smote_k_neighbors and selector_estimators must be positive".to_string(),
            ));
        }
        if !processing.skewness_threshold.is_finite() {
            return Err(PipelineError::Config(
                "data_processing.skewness_threshold must be finite".to_string(),
            ));
        }

        let categorical: HashSet<&str> = processing.categorical_columns.iter().map(String::as_str).collect();
        if let Some(overlap) = processing
            .numerical_columns
            .iter()
            .find(|c| categorical.contains(c.as_str()))
        {
            return Err(PipelineError::Config(format!(
                "column '{}' is listed as both categorical and numerical",
                overlap
            )));
        }
        if processing.numerical_columns.contains(&processing.label_column) {
            return Err(PipelineError::Config(format!(
                "label column '{}' cannot be numerical",
                processing.label_column
            )));
        }

        let training = &self.model_training;
        if training.cv_folds < 2 {
            return Err(PipelineError::Config(
                "model_training.cv_folds must be at least 2".to_string(),
            ));
        }
        if training.n_iter == 0 {
            return Err(PipelineError::Config(
                "model_training.n_iter must be at least 1".to_string(),
            ));
        }
        for (name, dist) in &training.search_space {
            dist.validate()
                .map_err(|reason| PipelineError::Config(format!("search_space.{}: {}", name, reason)))?;
        }

        Ok(())
    }
}

impl DataProcessingConfig {
    /// Columns that survive preprocessing: categorical, numerical, then the label
    pub fn model_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for col in self
            .categorical_columns
            .iter()
            .chain(self.numerical_columns.iter())
            .chain(std::iter::once(&self.label_column))
        {
            if !columns.contains(col) {
                columns.push(col.clone());
            }
        }
        columns
    }

    /// Columns that get label-encoded; the label is always among them
    pub fn encoded_columns(&self) -> Vec<String> {
        let mut columns = self.categorical_columns.clone();
        if !columns.contains(&self.label_column) {
            columns.push(self.label_column.clone());
        }
        columns
    }
}
