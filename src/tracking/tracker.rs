//! Experiment tracker implementations

use crate::error::{PipelineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

/// Capability interface for experiment tracking
pub trait RunTracker: Send {
    /// Open a run and return its id
    fn start_run(&mut self, run_name: &str) -> Result<String>;
    fn log_params(&mut self, params: &BTreeMap<String, String>) -> Result<()>;
    fn log_metrics(&mut self, metrics: &BTreeMap<String, f64>) -> Result<()>;
    fn log_artifact(&mut self, path: &Path) -> Result<()>;
    fn end_run(&mut self, status: RunStatus) -> Result<()>;
}

/// Tracker that records nothing
#[derive(Debug, Default)]
pub struct NoopTracker;

impl RunTracker for NoopTracker {
    fn start_run(&mut self, _run_name: &str) -> Result<String> {
        Ok(String::new())
    }

    fn log_params(&mut self, _params: &BTreeMap<String, String>) -> Result<()> {
        Ok(())
    }

    fn log_metrics(&mut self, _metrics: &BTreeMap<String, f64>) -> Result<()> {
        Ok(())
    }

    fn log_artifact(&mut self, _path: &Path) -> Result<()> {
        Ok(())
    }

    fn end_run(&mut self, _status: RunStatus) -> Result<()> {
        Ok(())
    }
}

/// A run as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub run_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
    pub artifacts: Vec<String>,
}

/// Stores each run as `<root>/<run_id>/run.json` with artifacts copied
/// under `<root>/<run_id>/artifacts/`
#[derive(Debug)]
pub struct LocalTracker {
    root: PathBuf,
    current: Option<RunRecord>,
}

impl LocalTracker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            current: None,
        }
    }

    fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join(run_id)
    }

    fn active(&mut self) -> Result<&mut RunRecord> {
        self.current
            .as_mut()
            .ok_or_else(|| PipelineError::Tracking("no active run".to_string()))
    }

    fn flush(&self) -> Result<()> {
        let run = self
            .current
            .as_ref()
            .ok_or_else(|| PipelineError::Tracking("no active run".to_string()))?;
        let dir = self.run_dir(&run.run_id);
        std::fs::create_dir_all(&dir).map_err(|e| PipelineError::Tracking(e.to_string()))?;
        let json = serde_json::to_string_pretty(run)?;
        std::fs::write(dir.join("run.json"), json).map_err(|e| PipelineError::Tracking(e.to_string()))?;
        Ok(())
    }

    /// Read a stored run back
    pub fn load_run(&self, run_id: &str) -> Result<RunRecord> {
        let text = std::fs::read_to_string(self.run_dir(run_id).join("run.json"))
            .map_err(|e| PipelineError::Tracking(e.to_string()))?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl RunTracker for LocalTracker {
    fn start_run(&mut self, run_name: &str) -> Result<String> {
        if let Some(open) = &self.current {
            warn!(run_id = %open.run_id, "Starting a new run while another is open");
        }
        let run_id = Uuid::new_v4().to_string();
        self.current = Some(RunRecord {
            run_id: run_id.clone(),
            run_name: run_name.to_string(),
            start_time: Utc::now(),
            end_time: None,
            status: RunStatus::Running,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            artifacts: Vec::new(),
        });
        self.flush()?;
        debug!(run_id = %run_id, "Tracking run started");
        Ok(run_id)
    }

    fn log_params(&mut self, params: &BTreeMap<String, String>) -> Result<()> {
        self.active()?.params.extend(params.clone());
        self.flush()
    }

    fn log_metrics(&mut self, metrics: &BTreeMap<String, f64>) -> Result<()> {
        self.active()?.metrics.extend(metrics.clone());
        self.flush()
    }

    fn log_artifact(&mut self, path: &Path) -> Result<()> {
        let file_name = path
            .file_name()
            .ok_or_else(|| PipelineError::Tracking(format!("not a file: {}", path.display())))?
            .to_owned();
        let run_id = self.active()?.run_id.clone();
        let dest_dir = self.run_dir(&run_id).join("artifacts");
        std::fs::create_dir_all(&dest_dir).map_err(|e| PipelineError::Tracking(e.to_string()))?;
        std::fs::copy(path, dest_dir.join(&file_name))
            .map_err(|e| PipelineError::Tracking(format!("failed to copy {}: {}", path.display(), e)))?;

        self.active()?.artifacts.push(file_name.to_string_lossy().into_owned());
        self.flush()
    }

    fn end_run(&mut self, status: RunStatus) -> Result<()> {
        let run = self.active()?;
        run.status = status;
        run.end_time = Some(Utc::now());
        self.flush()?;
        self.current = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_tracker_records_run() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("model.json");
        std::fs::write(&artifact, "{}").unwrap();

        let mut tracker = LocalTracker::new(dir.path().join("mlruns"));
        let run_id = tracker.start_run("training").unwrap();
        tracker
            .log_params(&BTreeMap::from([("max_depth".to_string(), "3".to_string())]))
            .unwrap();
        tracker
            .log_metrics(&BTreeMap::from([("accuracy".to_string(), 0.9)]))
            .unwrap();
        tracker.log_artifact(&artifact).unwrap();
        tracker.end_run(RunStatus::Finished).unwrap();

        let record = tracker.load_run(&run_id).unwrap();
        assert_eq!(record.status, RunStatus::Finished);
        assert_eq!(record.params["max_depth"], "3");
        assert_eq!(record.metrics["accuracy"], 0.9);
        assert_eq!(record.artifacts, vec!["model.json"]);
        assert!(dir.path().join("mlruns").join(&run_id).join("artifacts").join("model.json").exists());
    }

    #[test]
    fn test_logging_without_run_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = LocalTracker::new(dir.path());
        let err = tracker.log_metrics(&BTreeMap::new()).unwrap_err();
        assert!(matches!(err, PipelineError::Tracking(_)));
    }
}
