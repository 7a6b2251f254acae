//! Error types for the booking-cancellation pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Acquisition error: {0}")]
    Acquisition(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Data range error in column '{column}': {reason}")]
    DataRange { column: String, reason: String },

    #[error("Unseen category '{value}' in column '{column}'")]
    UnseenCategory { column: String, value: String },

    #[error("Processing failed during {stage}: {source}")]
    Processing {
        stage: &'static str,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("Training failed during {stage}: {source}")]
    Training {
        stage: &'static str,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("Tracking error: {0}")]
    Tracking(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },
}

impl PipelineError {
    /// Wrap an error raised inside a data-processing stage
    pub fn processing(stage: &'static str, err: PipelineError) -> Self {
        PipelineError::Processing {
            stage,
            source: Box::new(err),
        }
    }

    /// Wrap an error raised inside a model-training stage
    pub fn training(stage: &'static str, err: PipelineError) -> Self {
        PipelineError::Training {
            stage,
            source: Box::new(err),
        }
    }

    /// Stage name for wrapped errors
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            PipelineError::Processing { stage, .. } | PipelineError::Training { stage, .. } => {
                Some(stage)
            }
            _ => None,
        }
    }

    /// Innermost cause, unwrapping stage wrappers
    pub fn root_cause(&self) -> &PipelineError {
        match self {
            PipelineError::Processing { source, .. } | PipelineError::Training { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        PipelineError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for PipelineError {
    fn from(err: serde_yaml::Error) -> Self {
        PipelineError::Config(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PipelineError {
    fn from(err: ndarray::ShapeError) -> Self {
        PipelineError::Shape {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
