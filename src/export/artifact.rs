//! Persisted model artifact

use super::schema::{FeatureSchema, RequestFields};
use crate::error::{PipelineError, Result};
use crate::training::gradient_boosting::GradientBoostingClassifier;
use crate::training::metrics::ClassificationReport;
use crate::training::search::{Scoring, TrialParams};
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Provenance recorded alongside the fitted model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub created_at: DateTime<Utc>,
    pub crate_version: String,
    pub best_params: TrialParams,
    pub scoring: Scoring,
    pub cv_score: f64,
    pub test_metrics: Option<ClassificationReport>,
}

/// Fitted classifier plus the input contract it was trained against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub schema: FeatureSchema,
    pub metadata: ModelMetadata,
    pub model: GradientBoostingClassifier,
}

impl ModelArtifact {
    pub fn new(model: GradientBoostingClassifier, schema: FeatureSchema, metadata: ModelMetadata) -> Result<Self> {
        let artifact = Self {
            schema,
            metadata,
            model,
        };
        artifact.check_consistent()?;
        Ok(artifact)
    }

    fn check_consistent(&self) -> Result<()> {
        if self.model.n_features() != self.schema.n_features() {
            return Err(PipelineError::Shape {
                expected: format!("{} features in schema", self.schema.n_features()),
                actual: format!("{} features in model", self.model.n_features()),
            });
        }
        Ok(())
    }

    /// Write as JSON, replacing any previous artifact at `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), "Model artifact saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let artifact: Self = serde_json::from_str(&json)?;
        artifact.check_consistent()?;
        Ok(artifact)
    }

    /// Predict from raw values given in schema order
    pub fn predict_raw(&self, raw: &[f64]) -> Result<i64> {
        let vector = self.schema.model_vector(raw)?;
        self.predict_vector(vector)
    }

    /// Predict from request fields named and ordered like the schema
    pub fn predict_fields(&self, fields: &RequestFields) -> Result<i64> {
        let vector = self.schema.vector_from_fields(fields)?;
        self.predict_vector(vector)
    }

    fn predict_vector(&self, vector: Vec<f64>) -> Result<i64> {
        let x = Array2::from_shape_vec((1, vector.len()), vector)?;
        let prediction = self.model.predict(&x)?;
        Ok(prediction[0] as i64)
    }
}
