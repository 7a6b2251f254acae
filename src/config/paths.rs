//! Artifact directory layout

use std::path::{Path, PathBuf};

/// File locations produced and consumed by the pipeline stages
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    root: PathBuf,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self::new("artifacts")
    }
}

impl ArtifactPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("raw")
    }

    pub fn raw_file(&self) -> PathBuf {
        self.raw_dir().join("raw.csv")
    }

    pub fn train_file(&self) -> PathBuf {
        self.raw_dir().join("train.csv")
    }

    pub fn test_file(&self) -> PathBuf {
        self.raw_dir().join("test.csv")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.root.join("processed")
    }

    pub fn processed_train_file(&self) -> PathBuf {
        self.processed_dir().join("processed_train.csv")
    }

    pub fn processed_test_file(&self) -> PathBuf {
        self.processed_dir().join("processed_test.csv")
    }

    /// Selected feature order written next to the processed tables
    pub fn feature_schema_file(&self) -> PathBuf {
        self.processed_dir().join("feature_schema.json")
    }

    pub fn model_file(&self) -> PathBuf {
        self.root.join("models").join("model.json")
    }

    pub fn tracking_dir(&self) -> PathBuf {
        self.root.join("mlruns")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let paths = ArtifactPaths::new("/tmp/run");
        assert_eq!(paths.train_file(), PathBuf::from("/tmp/run/raw/train.csv"));
        assert_eq!(
            paths.processed_test_file(),
            PathBuf::from("/tmp/run/processed/processed_test.csv")
        );
        assert_eq!(paths.model_file(), PathBuf::from("/tmp/run/models/model.json"));
    }
}
