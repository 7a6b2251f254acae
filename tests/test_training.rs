//! Integration test: model training stage
//! Tests: randomized search → evaluation → persistence → trainer run with tracking

use chrono::Utc;
use hotel_reservation_ml::config::{ArtifactPaths, ModelTrainingConfig};
use hotel_reservation_ml::error::{PipelineError, Result};
use hotel_reservation_ml::export::{FeatureKind, FeatureSchema, FeatureSpec, LabelSpec, ModelArtifact, ModelMetadata};
use hotel_reservation_ml::processing::frame::{frame_from_arrays, write_csv};
use hotel_reservation_ml::tracking::{LocalTracker, RunStatus, RunTracker, TrackingSession};
use hotel_reservation_ml::training::{
    ClassificationReport, GradientBoostingClassifier, GradientBoostingConfig, ModelTrainer, ParamDistribution,
    RandomizedSearch, Scoring,
};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;

/// label = 1 iff the first feature exceeds 0.5; the other two are noise
fn separable(n: usize, seed: u64) -> (Array2<f64>, Array1<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut x = Array2::zeros((n, 3));
    let mut y = Array1::zeros(n);
    for i in 0..n {
        // alternate classes so the set is balanced
        let signal = if i % 2 == 0 { rng.gen_range(0.55..1.0) } else { rng.gen_range(0.0..0.45) };
        x[[i, 0]] = signal;
        x[[i, 1]] = rng.gen::<f64>();
        x[[i, 2]] = rng.gen::<f64>() * 10.0;
        y[i] = if signal > 0.5 { 1.0 } else { 0.0 };
    }
    (x, y)
}

fn small_space() -> BTreeMap<String, ParamDistribution> {
    BTreeMap::from([
        ("n_estimators".to_string(), ParamDistribution::Int { low: 10, high: 30 }),
        ("max_depth".to_string(), ParamDistribution::Int { low: 2, high: 4 }),
        ("learning_rate".to_string(), ParamDistribution::Float { low: 0.05, high: 0.3 }),
    ])
}

fn schema() -> FeatureSchema {
    FeatureSchema {
        features: vec![
            FeatureSpec {
                name: "signal".to_string(),
                kind: FeatureKind::Numerical { log1p: false },
            },
            FeatureSpec {
                name: "noise".to_string(),
                kind: FeatureKind::Numerical { log1p: false },
            },
            FeatureSpec {
                name: "scaled_noise".to_string(),
                kind: FeatureKind::Numerical { log1p: false },
            },
        ],
        label: LabelSpec {
            name: "booking_status".to_string(),
            classes: vec!["Canceled".to_string(), "Not_Canceled".to_string()],
        },
    }
}

fn training_config() -> ModelTrainingConfig {
    ModelTrainingConfig {
        n_iter: 2,
        cv_folds: 2,
        scoring: Scoring::F1,
        random_state: 42,
        n_jobs: 2,
        search_space: small_space(),
    }
}

/// Write processed tables and schema the way the processing stage does
fn write_processed(paths: &ArtifactPaths) {
    let schema = schema();
    let names: Vec<String> = schema.feature_names().iter().map(|s| s.to_string()).collect();
    for (path, n, seed) in [
        (paths.processed_train_file(), 300, 1),
        (paths.processed_test_file(), 100, 2),
    ] {
        let (x, y) = separable(n, seed);
        let labels = y.mapv(|v| v as i64);
        let mut df = frame_from_arrays(&x, &names, &labels, &schema.label.name).unwrap();
        write_csv(&mut df, &path).unwrap();
    }
    schema.save(&paths.feature_schema_file()).unwrap();
}

// ============================================================================
// Search and evaluation
// ============================================================================

#[test]
fn test_search_learns_separable_pattern() {
    let (x_train, y_train) = separable(400, 1);
    let (x_test, y_test) = separable(200, 2);

    let outcome = RandomizedSearch::new(small_space())
        .with_n_iter(3)
        .with_cv_folds(3)
        .with_random_state(7)
        .fit(&x_train, &y_train)
        .unwrap();

    assert_eq!(outcome.trials.len(), 3);
    assert!(outcome.best_score() >= 0.9);

    let predictions = outcome.model.predict(&x_test).unwrap();
    let report = ClassificationReport::compute(&y_test, &predictions).unwrap();
    assert!(report.accuracy >= 0.9, "accuracy {}", report.accuracy);
    assert!(report.f1 >= 0.9, "f1 {}", report.f1);
}

#[test]
fn test_search_is_reproducible() {
    let (x, y) = separable(200, 3);
    let search = RandomizedSearch::new(small_space()).with_n_iter(3).with_cv_folds(2).with_random_state(11);

    let first = search.fit(&x, &y).unwrap();
    let second = search.clone().with_n_jobs(1).fit(&x, &y).unwrap();

    assert_eq!(first.best_trial_idx, second.best_trial_idx);
    assert_eq!(first.best_params(), second.best_params());
    assert_eq!(first.model.predict_proba(&x).unwrap(), second.model.predict_proba(&x).unwrap());
}

#[test]
fn test_unknown_hyperparameter_is_config_error() {
    let (x, y) = separable(50, 4);
    let mut space = small_space();
    space.insert("num_leaves".to_string(), ParamDistribution::Int { low: 10, high: 20 });

    let err = RandomizedSearch::new(space).with_n_iter(1).fit(&x, &y).unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_artifact_round_trip_predicts_identically() {
    let (x, y) = separable(200, 5);
    let mut model = GradientBoostingClassifier::new(GradientBoostingConfig {
        n_estimators: 20,
        max_depth: 3,
        subsample: 0.8,
        ..GradientBoostingConfig::default()
    });
    model.fit(&x, &y).unwrap();

    let metadata = ModelMetadata {
        created_at: Utc::now(),
        crate_version: env!("CARGO_PKG_VERSION").to_string(),
        best_params: BTreeMap::new(),
        scoring: Scoring::Accuracy,
        cv_score: 0.95,
        test_metrics: None,
    };
    let artifact = ModelArtifact::new(model, schema(), metadata).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("model.json");
    artifact.save(&path).unwrap();
    let loaded = ModelArtifact::load(&path).unwrap();

    assert_eq!(
        artifact.model.predict_proba(&x).unwrap(),
        loaded.model.predict_proba(&x).unwrap()
    );
    assert_eq!(loaded.schema, artifact.schema);
    assert_eq!(loaded.predict_raw(&[0.9, 0.1, 5.0]).unwrap(), 1);
    assert_eq!(loaded.predict_raw(&[0.1, 0.1, 5.0]).unwrap(), 0);

    // a second save replaces the first
    artifact.save(&path).unwrap();
    assert!(ModelArtifact::load(&path).is_ok());
}

#[test]
fn test_artifact_rejects_mismatched_schema() {
    let (x, y) = separable(60, 6);
    let mut model = GradientBoostingClassifier::new(GradientBoostingConfig {
        n_estimators: 5,
        ..GradientBoostingConfig::default()
    });
    model.fit(&x, &y).unwrap();

    let mut two_features = schema();
    two_features.features.pop();
    let metadata = ModelMetadata {
        created_at: Utc::now(),
        crate_version: "0.0.0".to_string(),
        best_params: BTreeMap::new(),
        scoring: Scoring::Accuracy,
        cv_score: 0.0,
        test_metrics: None,
    };
    assert!(matches!(
        ModelArtifact::new(model, two_features, metadata),
        Err(PipelineError::Shape { .. })
    ));
}

// ============================================================================
// Trainer stage
// ============================================================================

#[test]
fn test_trainer_run_persists_and_tracks() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ArtifactPaths::new(dir.path());
    write_processed(&paths);

    let mut tracking = TrackingSession::new(Box::new(LocalTracker::new(paths.tracking_dir())));
    let summary = ModelTrainer::new(training_config(), paths.clone()).run(&mut tracking).unwrap();

    assert!(summary.metrics.accuracy >= 0.9);
    assert_eq!(summary.model_path, paths.model_file());
    assert_eq!(tracking.failures(), 0);

    let artifact = ModelArtifact::load(&paths.model_file()).unwrap();
    assert_eq!(artifact.schema, schema());
    assert_eq!(artifact.metadata.scoring, Scoring::F1);
    assert!(artifact.metadata.test_metrics.is_some());

    let run_id = summary.run_id.expect("local tracker assigns a run id");
    let record = LocalTracker::new(paths.tracking_dir()).load_run(&run_id).unwrap();
    assert_eq!(record.status, RunStatus::Finished);
    assert!(record.metrics.contains_key("accuracy"));
    assert!(record.params.contains_key("n_estimators"));
    assert!(record.artifacts.contains(&"model.json".to_string()));
}

struct BrokenTracker;

impl RunTracker for BrokenTracker {
    fn start_run(&mut self, _run_name: &str) -> Result<String> {
        Err(PipelineError::Tracking("tracking server down".to_string()))
    }
    fn log_params(&mut self, _params: &BTreeMap<String, String>) -> Result<()> {
        Err(PipelineError::Tracking("tracking server down".to_string()))
    }
    fn log_metrics(&mut self, _metrics: &BTreeMap<String, f64>) -> Result<()> {
        Err(PipelineError::Tracking("tracking server down".to_string()))
    }
    fn log_artifact(&mut self, _path: &Path) -> Result<()> {
        Err(PipelineError::Tracking("tracking server down".to_string()))
    }
    fn end_run(&mut self, _status: RunStatus) -> Result<()> {
        Err(PipelineError::Tracking("tracking server down".to_string()))
    }
}

#[test]
fn test_tracking_failure_does_not_mask_success() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ArtifactPaths::new(dir.path());
    write_processed(&paths);

    let mut tracking = TrackingSession::new(Box::new(BrokenTracker));
    let summary = ModelTrainer::new(training_config(), paths.clone()).run(&mut tracking).unwrap();

    assert!(paths.model_file().exists());
    assert!(summary.run_id.is_none());
    assert!(tracking.failures() > 0);
}

#[test]
fn test_column_order_mismatch_fails_load_split() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ArtifactPaths::new(dir.path());
    write_processed(&paths);

    let mut reordered = schema();
    reordered.features.swap(0, 1);
    reordered.save(&paths.feature_schema_file()).unwrap();

    let err = ModelTrainer::new(training_config(), paths.clone())
        .run(&mut TrackingSession::disabled())
        .unwrap_err();
    assert_eq!(err.stage(), Some("load_split"));
    assert!(matches!(err.root_cause(), PipelineError::Schema(_)));
    assert!(!paths.model_file().exists());
}
