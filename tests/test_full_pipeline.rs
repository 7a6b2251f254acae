//! Integration test: full pipeline
//! Tests: local object store → ingestion → processing → training → artifact

use hotel_reservation_ml::config::{AppConfig, ArtifactPaths};
use hotel_reservation_ml::error::PipelineError;
use hotel_reservation_ml::export::{FeatureKind, ModelArtifact};
use hotel_reservation_ml::ingestion::LocalStore;
use hotel_reservation_ml::pipeline::Pipeline;
use hotel_reservation_ml::processing::frame::{column_names, read_csv};
use hotel_reservation_ml::tracking::{LocalTracker, RunStatus, TrackingSession};
use rand::prelude::*;
use std::path::Path;

const CONFIG: &str = r#"
data_ingestion:
  bucket_name: "hotel-reservation-raw-data"
  bucket_file_name: "Hotel_Reservations.csv"
  train_ratio: 0.8

data_processing:
  categorical_columns:
    - type_of_meal_plan
    - required_car_parking_space
    - room_type_reserved
    - market_segment_type
    - repeated_guest
    - booking_status
  numerical_columns:
    - no_of_adults
    - no_of_children
    - no_of_weekend_nights
    - no_of_week_nights
    - lead_time
    - arrival_year
    - arrival_month
    - arrival_date
    - no_of_previous_cancellations
    - no_of_previous_bookings_not_canceled
    - avg_price_per_room
    - no_of_special_requests
  skewness_threshold: 5
  top_n_feature: 10
  selector_estimators: 20

model_training:
  n_iter: 2
  cv_folds: 2
  search_space:
    n_estimators: { type: int, low: 20, high: 40 }
    max_depth: { type: int, low: 2, high: 4 }
    learning_rate: { type: float, low: 0.05, high: 0.2 }
"#;

const HEADER: &str = "Booking_ID,no_of_adults,no_of_children,no_of_weekend_nights,no_of_week_nights,\
type_of_meal_plan,required_car_parking_space,room_type_reserved,lead_time,arrival_year,arrival_month,\
arrival_date,market_segment_type,repeated_guest,no_of_previous_cancellations,\
no_of_previous_bookings_not_canceled,avg_price_per_room,no_of_special_requests,booking_status";

/// Synthetic bookings shaped like the hotel reservations dataset
fn write_raw_bookings(dir: &Path, n: usize) {
    let meal_plans = ["Meal Plan 1", "Meal Plan 2", "Not Selected"];
    let rooms = ["Room_Type 1", "Room_Type 2", "Room_Type 4"];
    let segments = ["Online", "Offline", "Corporate"];
    let mut rng = StdRng::seed_from_u64(2024);

    let mut csv = String::from(HEADER);
    csv.push('\n');
    for i in 0..n {
        let lead_time: u32 = if rng.gen_bool(0.35) { rng.gen_range(150..400) } else { rng.gen_range(0..90) };
        let special_requests: u32 = rng.gen_range(0..4);
        let price: f64 = (rng.gen_range(50.0..200.0f64) * 100.0).round() / 100.0;
        let repeated = u32::from(rng.gen_bool(0.1));
        let previous_cancellations = if rng.gen_bool(0.03) { rng.gen_range(1..5) } else { 0 };
        let canceled = lead_time >= 150 && special_requests < 3;
        csv.push_str(&format!(
            "INN{:05},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}\n",
            i,
            rng.gen_range(1..4),
            rng.gen_range(0..3),
            rng.gen_range(0..3),
            rng.gen_range(0..6),
            meal_plans[i % meal_plans.len()],
            u32::from(rng.gen_bool(0.2)),
            rooms[(i / 3) % rooms.len()],
            lead_time,
            2017 + (i % 2),
            rng.gen_range(1..13),
            rng.gen_range(1..29),
            segments[(i / 9) % segments.len()],
            repeated,
            previous_cancellations,
            if repeated == 1 { rng.gen_range(1..10) } else { 0 },
            price,
            special_requests,
            if canceled { "Canceled" } else { "Not_Canceled" },
        ));
    }
    std::fs::write(dir.join("Hotel_Reservations.csv"), csv).unwrap();
}

#[tokio::test]
async fn test_full_pipeline_produces_servable_model() {
    let source = tempfile::tempdir().unwrap();
    write_raw_bookings(source.path(), 400);
    let out = tempfile::tempdir().unwrap();
    let paths = ArtifactPaths::new(out.path());

    let pipeline = Pipeline::new(AppConfig::from_yaml(CONFIG).unwrap(), paths.clone());
    let tracking = pipeline.tracking_session(true);
    let summary = pipeline
        .run(Box::new(LocalStore::new(source.path())), tracking)
        .await
        .unwrap();

    assert_eq!(summary.ingestion.raw_rows, 400);
    assert_eq!(summary.ingestion.train_rows, 320);
    assert_eq!(summary.ingestion.test_rows, 80);
    assert_eq!(summary.processing.selected_features.len(), 10);
    assert!(summary.training.metrics.accuracy >= 0.8, "accuracy {}", summary.training.metrics.accuracy);

    for file in [
        paths.raw_file(),
        paths.train_file(),
        paths.test_file(),
        paths.processed_train_file(),
        paths.processed_test_file(),
        paths.feature_schema_file(),
        paths.model_file(),
    ] {
        assert!(file.exists(), "{} missing", file.display());
    }

    let raw_train = read_csv(&paths.train_file()).unwrap();
    assert_eq!(column_names(&raw_train)[0], "Unnamed: 0");

    let artifact = ModelArtifact::load(&paths.model_file()).unwrap();
    let processed = read_csv(&paths.processed_train_file()).unwrap();
    assert_eq!(column_names(&processed), artifact.schema.table_columns());
    assert!(artifact.schema.feature_names().contains(&"lead_time"));

    // any valid raw input gets a binary answer
    let input: Vec<f64> = artifact
        .schema
        .features
        .iter()
        .map(|f| match f.kind {
            FeatureKind::Categorical { .. } => 0.0,
            FeatureKind::Numerical { .. } => 1.0,
        })
        .collect();
    let output = artifact.predict_raw(&input).unwrap();
    assert!(output == 0 || output == 1);

    let run_id = summary.training.run_id.expect("run tracked");
    let record = LocalTracker::new(paths.tracking_dir()).load_run(&run_id).unwrap();
    assert_eq!(record.status, RunStatus::Finished);
}

#[tokio::test]
async fn test_pipeline_is_reproducible() {
    let source = tempfile::tempdir().unwrap();
    write_raw_bookings(source.path(), 200);
    let config = AppConfig::from_yaml(CONFIG).unwrap();

    let mut schemas = Vec::new();
    for _ in 0..2 {
        let out = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(config.clone(), ArtifactPaths::new(out.path()));
        let summary = pipeline
            .run(Box::new(LocalStore::new(source.path())), TrackingSession::disabled())
            .await
            .unwrap();
        schemas.push((summary.processing.selected_features, summary.training.metrics.accuracy));
    }
    assert_eq!(schemas[0], schemas[1]);
}

#[tokio::test]
async fn test_missing_raw_file_stops_the_run() {
    let source = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let paths = ArtifactPaths::new(out.path());

    let pipeline = Pipeline::new(AppConfig::from_yaml(CONFIG).unwrap(), paths.clone());
    let err = pipeline
        .run(Box::new(LocalStore::new(source.path())), TrackingSession::disabled())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Acquisition(_)));
    assert!(!paths.processed_train_file().exists());
    assert!(!paths.model_file().exists());
}
