//! Run driver: ingestion, then processing, then training
//!
//! Each stage reads the files the previous stage wrote, so stages can also be
//! run on their own. The first failing stage ends the run.

use crate::config::{AppConfig, ArtifactPaths};
use crate::error::{PipelineError, Result};
use crate::ingestion::{DataIngestion, IngestionSummary, ObjectStore};
use crate::processing::{DataProcessor, ProcessingSummary};
use crate::tracking::{LocalTracker, TrackingSession};
use crate::training::{ModelTrainer, TrainingSummary};
use std::time::Instant;
use tracing::info;

/// Everything a full run produced
#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub ingestion: IngestionSummary,
    pub processing: ProcessingSummary,
    pub training: TrainingSummary,
    pub elapsed_secs: f64,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: AppConfig,
    paths: ArtifactPaths,
}

impl Pipeline {
    pub fn new(config: AppConfig, paths: ArtifactPaths) -> Self {
        Self { config, paths }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    /// Local run tracking under the artifact directory, or none
    pub fn tracking_session(&self, enabled: bool) -> TrackingSession {
        if enabled {
            TrackingSession::new(Box::new(LocalTracker::new(self.paths.tracking_dir())))
        } else {
            TrackingSession::disabled()
        }
    }

    pub async fn ingest(&self, store: Box<dyn ObjectStore>) -> Result<IngestionSummary> {
        DataIngestion::new(self.config.data_ingestion.clone(), self.paths.clone(), store)
            .run()
            .await
    }

    pub fn process(&self) -> Result<ProcessingSummary> {
        DataProcessor::new(self.config.data_processing.clone(), self.paths.clone()).process()
    }

    pub fn train(&self, tracking: &mut TrackingSession) -> Result<TrainingSummary> {
        let summary = ModelTrainer::new(self.config.model_training.clone(), self.paths.clone()).run(tracking)?;
        if tracking.failures() > 0 {
            info!(failures = tracking.failures(), "Training finished with tracking failures");
        }
        Ok(summary)
    }

    /// Full run; processing and training execute on the blocking pool
    pub async fn run(&self, store: Box<dyn ObjectStore>, tracking: TrackingSession) -> Result<PipelineSummary> {
        let start = Instant::now();
        info!(artifacts = %self.paths.root().display(), "Pipeline started");

        let ingestion = self.ingest(store).await?;

        let pipeline = self.clone();
        let (processing, training) = tokio::task::spawn_blocking(move || -> Result<_> {
            let mut tracking = tracking;
            let processing = pipeline.process()?;
            let training = pipeline.train(&mut tracking)?;
            Ok((processing, training))
        })
        .await
        .map_err(|e| PipelineError::Data(format!("pipeline worker stopped: {}", e)))??;

        let elapsed_secs = start.elapsed().as_secs_f64();
        info!(
            accuracy = training.metrics.accuracy,
            f1 = training.metrics.f1,
            model = %training.model_path.display(),
            elapsed_secs,
            "Pipeline completed"
        );

        Ok(PipelineSummary {
            ingestion,
            processing,
            training,
            elapsed_secs,
        })
    }
}
