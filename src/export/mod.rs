//! Persisted artifacts
//!
//! - [`FeatureSchema`]: selected feature order and per-feature transforms,
//!   written by processing and embedded in the model artifact
//! - [`ModelArtifact`]: fitted classifier, schema and run metadata as JSON

mod artifact;
mod schema;

pub use artifact::{ModelArtifact, ModelMetadata};
pub use schema::{FeatureKind, FeatureSchema, FeatureSpec, LabelSpec, RequestFields};
