//! Experiment tracking
//!
//! Trackers implement [`RunTracker`]. Pipeline code only talks to a
//! [`TrackingSession`], which logs and counts tracker failures instead of
//! returning them, so a broken tracking backend never changes a run's outcome.

mod tracker;

pub use tracker::{LocalTracker, NoopTracker, RunRecord, RunStatus, RunTracker};

use crate::error::Result;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// Best-effort wrapper around a tracker
pub struct TrackingSession {
    tracker: Box<dyn RunTracker>,
    run_id: Option<String>,
    failures: usize,
}

impl TrackingSession {
    pub fn new(tracker: Box<dyn RunTracker>) -> Self {
        Self {
            tracker,
            run_id: None,
            failures: 0,
        }
    }

    pub fn disabled() -> Self {
        Self::new(Box::new(NoopTracker))
    }

    fn guard<T>(&mut self, operation: &'static str, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.failures += 1;
                warn!(operation, error = %e, "Experiment tracking failed; continuing");
                None
            }
        }
    }

    pub fn start_run(&mut self, run_name: &str) {
        let result = self.tracker.start_run(run_name);
        self.run_id = self.guard("start_run", result);
    }

    pub fn log_params(&mut self, params: &BTreeMap<String, String>) {
        let result = self.tracker.log_params(params);
        self.guard("log_params", result);
    }

    pub fn log_metrics(&mut self, metrics: &BTreeMap<String, f64>) {
        let result = self.tracker.log_metrics(metrics);
        self.guard("log_metrics", result);
    }

    pub fn log_artifact(&mut self, path: &Path) {
        let result = self.tracker.log_artifact(path);
        self.guard("log_artifact", result);
    }

    pub fn end_run(&mut self, status: RunStatus) {
        let result = self.tracker.end_run(status);
        self.guard("end_run", result);
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Number of tracker calls that failed
    pub fn failures(&self) -> usize {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    struct BrokenTracker;

    impl RunTracker for BrokenTracker {
        fn start_run(&mut self, _run_name: &str) -> Result<String> {
            Err(PipelineError::Tracking("backend unreachable".to_string()))
        }
        fn log_params(&mut self, _params: &BTreeMap<String, String>) -> Result<()> {
            Err(PipelineError::Tracking("backend unreachable".to_string()))
        }
        fn log_metrics(&mut self, _metrics: &BTreeMap<String, f64>) -> Result<()> {
            Err(PipelineError::Tracking("backend unreachable".to_string()))
        }
        fn log_artifact(&mut self, _path: &Path) -> Result<()> {
            Err(PipelineError::Tracking("backend unreachable".to_string()))
        }
        fn end_run(&mut self, _status: RunStatus) -> Result<()> {
            Err(PipelineError::Tracking("backend unreachable".to_string()))
        }
    }

    #[test]
    fn test_failures_are_isolated() {
        let mut session = TrackingSession::new(Box::new(BrokenTracker));
        session.start_run("training");
        session.log_metrics(&BTreeMap::from([("accuracy".to_string(), 1.0)]));
        session.log_artifact(Path::new("missing.json"));
        session.end_run(RunStatus::Finished);

        assert_eq!(session.failures(), 4);
        assert_eq!(session.run_id(), None);
    }

    #[test]
    fn test_noop_session() {
        let mut session = TrackingSession::disabled();
        session.start_run("training");
        session.end_run(RunStatus::Finished);
        assert_eq!(session.failures(), 0);
    }
}
