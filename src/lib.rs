//! Hotel reservation cancellation pipeline
//!
//! A batch pipeline that turns a raw bookings CSV into a gradient-boosted
//! cancellation classifier, plus the HTTP service that serves it.
//!
//! # Modules
//!
//! ## Pipeline stages
//! - [`ingestion`] - Raw file download and seeded train/test split
//! - [`processing`] - Cleaning, label encoding, skew correction, SMOTE, feature selection
//! - [`training`] - Tree learners, gradient boosting, cross-validated randomized search
//! - [`pipeline`] - Runs the stages in order
//!
//! ## Artifacts
//! - [`export`] - Feature schema and persisted model artifact
//! - [`tracking`] - Experiment tracking with isolated failures
//!
//! ## Services
//! - [`server`] - Prediction API and HTML form
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Pipeline stages
pub mod ingestion;
pub mod processing;
pub mod training;
pub mod pipeline;

// Artifacts
pub mod export;
pub mod tracking;

// Services
pub mod server;
pub mod cli;

pub use error::{PipelineError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{PipelineError, Result};
    pub use crate::config::{AppConfig, ArtifactPaths};

    pub use crate::ingestion::{DataIngestion, HttpStore, LocalStore, ObjectStore};
    pub use crate::processing::{DataProcessor, FittedPreprocessor, Preprocessor};
    pub use crate::training::{
        ClassificationReport, GradientBoostingClassifier, ModelTrainer, RandomizedSearch,
    };
    pub use crate::pipeline::Pipeline;

    pub use crate::export::{FeatureSchema, ModelArtifact};
    pub use crate::tracking::{LocalTracker, RunTracker, TrackingSession};
}
