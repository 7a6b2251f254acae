//! Raw data acquisition
//!
//! Downloads the bookings CSV from an [`ObjectStore`], keeps a copy as
//! `raw.csv`, and writes a seeded random train/test split. Both split files
//! start with an `Unnamed: 0` column holding each row's position in the raw
//! file; processing drops it as an identifier.

mod store;

pub use store::{HttpStore, LocalStore, ObjectStore, DEFAULT_FETCH_TIMEOUT_SECS};

use crate::config::{ArtifactPaths, DataIngestionConfig};
use crate::error::{PipelineError, Result};
use crate::processing::frame::{read_csv, write_csv};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::Instant;
use tracing::{info, warn};

/// Name of the row-position column written into the split files
pub const ROW_INDEX_COLUMN: &str = "Unnamed: 0";

/// Row counts of a finished ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionSummary {
    pub raw_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Wrap a failure as an acquisition error; config and acquisition errors pass through
fn acquisition(context: &'static str) -> impl Fn(PipelineError) -> PipelineError {
    move |e| match e {
        e @ (PipelineError::Acquisition(_) | PipelineError::Config(_)) => e,
        other => PipelineError::Acquisition(format!("{}: {}", context, other)),
    }
}

/// Shuffled row positions split into (train, test)
///
/// The test partition takes `ceil(n * (1 - train_ratio))` rows from the front
/// of the permutation and the training partition gets the rest.
pub fn split_indices(n_rows: usize, train_ratio: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(train_ratio > 0.0 && train_ratio < 1.0) {
        return Err(PipelineError::Config(format!(
            "train_ratio must be in (0, 1), got {}",
            train_ratio
        )));
    }
    let n_test = ((n_rows as f64) * (1.0 - train_ratio)).ceil() as usize;
    if n_rows < 2 || n_test == 0 || n_test >= n_rows {
        return Err(PipelineError::Acquisition(format!(
            "cannot split {} rows with train_ratio {}",
            n_rows, train_ratio
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut order: Vec<usize> = (0..n_rows).collect();
    order.shuffle(&mut rng);

    let train = order.split_off(n_test);
    Ok((train, order))
}

/// Rows of `df` at `positions`, prefixed with their original positions
fn partition(df: &DataFrame, positions: &[usize]) -> Result<DataFrame> {
    let idx: Vec<IdxSize> = positions.iter().map(|&p| p as IdxSize).collect();
    let mut out = df.take(&IdxCa::from_vec("idx".into(), idx))?;
    let original: Vec<i64> = positions.iter().map(|&p| p as i64).collect();
    out.insert_column(0, Series::new(ROW_INDEX_COLUMN.into(), original))?;
    Ok(out)
}

pub struct DataIngestion {
    config: DataIngestionConfig,
    paths: ArtifactPaths,
    store: Box<dyn ObjectStore>,
}

impl DataIngestion {
    pub fn new(config: DataIngestionConfig, paths: ArtifactPaths, store: Box<dyn ObjectStore>) -> Self {
        Self { config, paths, store }
    }

    /// Store for the configured endpoint
    pub fn http(config: DataIngestionConfig, paths: ArtifactPaths) -> Result<Self> {
        let store = HttpStore::new(&config.endpoint)?;
        Ok(Self::new(config, paths, Box::new(store)))
    }

    /// Download the raw file into the artifact directory
    pub async fn download(&self) -> Result<usize> {
        let bucket = &self.config.bucket_name;
        let object = &self.config.bucket_file_name;
        info!(source = %self.store.describe(bucket, object), "Downloading raw data");

        let bytes = self.store.fetch(bucket, object).await.map_err(acquisition("fetch failed"))?;
        if bytes.is_empty() {
            return Err(PipelineError::Acquisition(format!("object '{}' is empty", object)));
        }

        let raw_file = self.paths.raw_file();
        std::fs::create_dir_all(self.paths.raw_dir())
            .map_err(|e| PipelineError::Acquisition(format!("failed to create raw directory: {}", e)))?;
        std::fs::write(&raw_file, &bytes)
            .map_err(|e| PipelineError::Acquisition(format!("failed to write {}: {}", raw_file.display(), e)))?;

        info!(path = %raw_file.display(), bytes = bytes.len(), "Raw data saved");
        Ok(bytes.len())
    }

    /// Split `raw.csv` into the train and test files
    pub fn split(&self) -> Result<IngestionSummary> {
        let mut raw = read_csv(&self.paths.raw_file())
            .map_err(|e| PipelineError::Acquisition(format!("unreadable raw file: {}", e)))?;
        if raw.get_column_index(ROW_INDEX_COLUMN).is_some() {
            warn!(column = ROW_INDEX_COLUMN, "Raw file already has a row-index column; replacing it");
            raw = raw
                .drop(ROW_INDEX_COLUMN)
                .map_err(PipelineError::from)
                .map_err(acquisition("failed to drop row index"))?;
        }

        let (train_idx, test_idx) =
            split_indices(raw.height(), self.config.train_ratio, self.config.random_state)?;
        let mut train = partition(&raw, &train_idx).map_err(acquisition("failed to partition rows"))?;
        let mut test = partition(&raw, &test_idx).map_err(acquisition("failed to partition rows"))?;

        write_csv(&mut train, &self.paths.train_file()).map_err(acquisition("failed to write train split"))?;
        write_csv(&mut test, &self.paths.test_file()).map_err(acquisition("failed to write test split"))?;

        let summary = IngestionSummary {
            raw_rows: raw.height(),
            train_rows: train.height(),
            test_rows: test.height(),
        };
        info!(
            raw_rows = summary.raw_rows,
            train_rows = summary.train_rows,
            test_rows = summary.test_rows,
            "Train/test split saved"
        );
        Ok(summary)
    }

    pub async fn run(&self) -> Result<IngestionSummary> {
        let start = Instant::now();
        info!(bucket = %self.config.bucket_name, file = %self.config.bucket_file_name, "Data ingestion started");

        self.download().await?;
        let summary = self.split()?;

        info!(elapsed_secs = start.elapsed().as_secs_f64(), "Data ingestion completed");
        Ok(summary)
    }
}
