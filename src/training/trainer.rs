//! Model trainer
//!
//! Loads the processed split, runs the randomized search, evaluates the refit
//! winner on the held-out table and persists it together with its schema.

use super::gradient_boosting::GradientBoostingClassifier;
use super::metrics::ClassificationReport;
use super::search::{RandomizedSearch, SearchOutcome};
use crate::config::{ArtifactPaths, ModelTrainingConfig};
use crate::error::{PipelineError, Result};
use crate::export::{FeatureSchema, ModelArtifact, ModelMetadata};
use crate::processing::frame::{column_names, columns_to_array2, f64_values, read_csv};
use crate::tracking::{RunStatus, TrackingSession};
use chrono::Utc;
use ndarray::{Array1, Array2};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Feature matrices and labels for both partitions
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: Array2<f64>,
    pub y_train: Array1<f64>,
    pub x_test: Array2<f64>,
    pub y_test: Array1<f64>,
}

/// What a training run produced
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub cv_score: f64,
    pub metrics: ClassificationReport,
    pub model_path: std::path::PathBuf,
    pub run_id: Option<String>,
}

pub struct ModelTrainer {
    config: ModelTrainingConfig,
    paths: ArtifactPaths,
}

impl ModelTrainer {
    pub fn new(config: ModelTrainingConfig, paths: ArtifactPaths) -> Self {
        Self { config, paths }
    }

    /// Read a processed table, checking it matches the schema's column order
    fn load_table(path: &Path, schema: &FeatureSchema) -> Result<(Array2<f64>, Array1<f64>)> {
        let df = read_csv(path)?;
        let expected = schema.table_columns();
        let actual = column_names(&df);
        if actual != expected {
            return Err(PipelineError::Schema(format!(
                "{} has columns [{}], expected [{}]",
                path.display(),
                actual.join(", "),
                expected.join(", ")
            )));
        }

        let features: Vec<String> = schema.feature_names().iter().map(|s| s.to_string()).collect();
        let x = columns_to_array2(&df, &features)?;
        let y = Array1::from_vec(f64_values(&df, &schema.label.name)?);
        if let Some(bad) = y.iter().find(|&&v| v != 0.0 && v != 1.0) {
            return Err(PipelineError::Validation(format!(
                "{}: label '{}' must be 0 or 1, found {}",
                path.display(),
                schema.label.name,
                bad
            )));
        }
        Ok((x, y))
    }

    pub fn load_split(&self, train_path: &Path, test_path: &Path, schema: &FeatureSchema) -> Result<TrainTestSplit> {
        let (x_train, y_train) = Self::load_table(train_path, schema)?;
        let (x_test, y_test) = Self::load_table(test_path, schema)?;
        info!(
            train_rows = x_train.nrows(),
            test_rows = x_test.nrows(),
            features = x_train.ncols(),
            "Processed split loaded"
        );
        Ok(TrainTestSplit {
            x_train,
            y_train,
            x_test,
            y_test,
        })
    }

    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<SearchOutcome> {
        RandomizedSearch::from_config(&self.config).fit(x, y)
    }

    pub fn evaluate(
        &self,
        model: &GradientBoostingClassifier,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<ClassificationReport> {
        let report = ClassificationReport::compute(y, &model.predict(x)?)?;
        info!(
            accuracy = report.accuracy,
            precision = report.precision,
            recall = report.recall,
            f1 = report.f1,
            "Model evaluated"
        );
        Ok(report)
    }

    pub fn persist(&self, artifact: &ModelArtifact, path: &Path) -> Result<()> {
        artifact.save(path)
    }

    /// Full training stage; tracking is best-effort and never decides the outcome
    pub fn run(&self, tracking: &mut TrackingSession) -> Result<TrainingSummary> {
        tracking.start_run("model_training");
        let result = self.run_stages(tracking);
        tracking.end_run(if result.is_ok() { RunStatus::Finished } else { RunStatus::Failed });

        result.map(|mut summary| {
            summary.run_id = tracking.run_id().map(str::to_string);
            summary
        })
    }

    fn run_stages(&self, tracking: &mut TrackingSession) -> Result<TrainingSummary> {
        let start = Instant::now();
        let wrap = |stage: &'static str| move |e: PipelineError| PipelineError::training(stage, e);

        let schema = FeatureSchema::load(&self.paths.feature_schema_file()).map_err(wrap("load_split"))?;
        let split = self
            .load_split(
                &self.paths.processed_train_file(),
                &self.paths.processed_test_file(),
                &schema,
            )
            .map_err(wrap("load_split"))?;
        tracking.log_artifact(&self.paths.processed_train_file());
        tracking.log_artifact(&self.paths.processed_test_file());

        let outcome = self.fit(&split.x_train, &split.y_train).map_err(wrap("search"))?;
        let params: BTreeMap<String, String> = outcome
            .best_params()
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect();
        info!(params = ?params, cv_score = outcome.best_score(), "Best configuration");
        tracking.log_params(&params);

        let metrics = self
            .evaluate(&outcome.model, &split.x_test, &split.y_test)
            .map_err(wrap("evaluate"))?;
        tracking.log_metrics(&metrics.as_pairs().iter().map(|(k, v)| (k.to_string(), *v)).collect());

        let cv_score = outcome.best_score();
        let model_path = self.paths.model_file();
        let metadata = ModelMetadata {
            created_at: Utc::now(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            best_params: outcome.best_params().clone(),
            scoring: self.config.scoring,
            cv_score,
            test_metrics: Some(metrics),
        };
        ModelArtifact::new(outcome.model, schema, metadata)
            .and_then(|artifact| self.persist(&artifact, &model_path))
            .map_err(wrap("persist"))?;
        tracking.log_artifact(&model_path);

        info!(elapsed_secs = start.elapsed().as_secs_f64(), "Model training completed");
        Ok(TrainingSummary {
            cv_score,
            metrics,
            model_path,
            run_id: None,
        })
    }
}
