//! Application state shared across handlers

use crate::export::ModelArtifact;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Read-only after startup, so handlers share it without locking
pub struct AppState {
    pub artifact: Arc<ModelArtifact>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(artifact: ModelArtifact) -> Self {
        Self {
            artifact: Arc::new(artifact),
            started_at: Utc::now(),
        }
    }
}
