//! Command-line interface
//!
//! Every command loads the YAML configuration, so a bad configuration fails
//! before any stage starts.

use clap::{Parser, Subcommand};
use colored::*;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{AppConfig, ArtifactPaths, DEFAULT_CONFIG_PATH};
use crate::export::FeatureSchema;
use crate::ingestion::{HttpStore, LocalStore, ObjectStore};
use crate::pipeline::Pipeline;
use crate::server::{run_server, ServerConfig};
use crate::training::ClassificationReport;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn muted(s: &str) -> ColoredString { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString    { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
}

fn step_ok(msg: &str, detail: &str) {
    println!("  {} {} {}", ok("✓"), msg, dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn print_metrics(report: &ClassificationReport) {
    for (name, value) in report.as_pairs() {
        kv(name, &format!("{:.4}", value));
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "hotel-reservation")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Booking cancellation pipeline and prediction service")]
pub struct Cli {
    /// Pipeline configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Directory for raw, processed, model and tracking artifacts
    #[arg(long, global = true, default_value = "artifacts")]
    pub artifacts: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download the raw bookings file and split it into train/test
    Ingest {
        /// Read the raw file from this directory instead of the object store
        #[arg(long)]
        from_dir: Option<PathBuf>,
    },

    /// Clean, encode, balance and reduce the train/test split
    Process,

    /// Search hyperparameters, evaluate and persist the model
    Train {
        /// Skip local run tracking
        #[arg(long)]
        no_tracking: bool,
    },

    /// Ingest, process and train in one go
    Run {
        #[arg(long)]
        from_dir: Option<PathBuf>,

        #[arg(long)]
        no_tracking: bool,
    },

    /// Serve predictions over HTTP
    Serve {
        /// Bind address (default: API_HOST or 0.0.0.0)
        #[arg(long)]
        host: Option<String>,

        /// Port (default: API_PORT or 8000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Model artifact (default: MODEL_PATH or <artifacts>/models/model.json)
        #[arg(short, long)]
        model: Option<PathBuf>,
    },

    /// Ask a running server for a prediction
    Predict {
        /// Server base URL
        #[arg(long, default_value = "http://localhost:8000")]
        url: String,

        /// Feature value as name=value, repeated in schema order
        #[arg(short, long = "field", value_name = "NAME=VALUE")]
        fields: Vec<String>,
    },
}

fn load_pipeline(config_path: &Path, artifacts: &Path) -> anyhow::Result<Pipeline> {
    let config = AppConfig::load(config_path)?;
    Ok(Pipeline::new(config, ArtifactPaths::new(artifacts)))
}

fn object_store(pipeline: &Pipeline, from_dir: Option<PathBuf>) -> anyhow::Result<Box<dyn ObjectStore>> {
    Ok(match from_dir {
        Some(dir) => Box::new(LocalStore::new(dir)),
        None => Box::new(HttpStore::new(&pipeline.config().data_ingestion.endpoint)?),
    })
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_ingest(config: &Path, artifacts: &Path, from_dir: Option<PathBuf>) -> anyhow::Result<()> {
    section("Ingest");
    let pipeline = load_pipeline(config, artifacts)?;
    let store = object_store(&pipeline, from_dir)?;

    let start = Instant::now();
    let summary = pipeline.ingest(store).await?;
    step_ok("Raw data split", &format!("in {:.2?}", start.elapsed()));
    kv("Raw rows", &summary.raw_rows.to_string());
    kv("Train rows", &summary.train_rows.to_string());
    kv("Test rows", &summary.test_rows.to_string());
    println!();
    Ok(())
}

pub fn cmd_process(config: &Path, artifacts: &Path) -> anyhow::Result<()> {
    section("Process");
    let pipeline = load_pipeline(config, artifacts)?;

    let start = Instant::now();
    let summary = pipeline.process()?;
    step_ok("Processed tables written", &format!("in {:.2?}", start.elapsed()));
    kv("Train rows", &summary.train_rows.to_string());
    kv("Test rows", &summary.test_rows.to_string());
    kv("Skew corrected", &summary.skewed_columns.join(", "));
    kv("Features", &summary.selected_features.join(", "));
    println!();
    Ok(())
}

pub fn cmd_train(config: &Path, artifacts: &Path, no_tracking: bool) -> anyhow::Result<()> {
    section("Train");
    let pipeline = load_pipeline(config, artifacts)?;
    let mut tracking = pipeline.tracking_session(!no_tracking);

    let start = Instant::now();
    let summary = pipeline.train(&mut tracking)?;
    step_ok("Model trained", &format!("in {:.2?}", start.elapsed()));
    kv("CV score", &format!("{:.4}", summary.cv_score));
    print_metrics(&summary.metrics);
    kv("Model", &summary.model_path.display().to_string());
    if let Some(run_id) = &summary.run_id {
        kv("Run", run_id);
    }
    println!();
    Ok(())
}

pub async fn cmd_run(
    config: &Path,
    artifacts: &Path,
    from_dir: Option<PathBuf>,
    no_tracking: bool,
) -> anyhow::Result<()> {
    section("Pipeline");
    let pipeline = load_pipeline(config, artifacts)?;
    let store = object_store(&pipeline, from_dir)?;
    let tracking = pipeline.tracking_session(!no_tracking);

    let summary = pipeline.run(store, tracking).await?;
    step_ok(
        "Ingestion",
        &format!("{} train / {} test rows", summary.ingestion.train_rows, summary.ingestion.test_rows),
    );
    step_ok("Processing", &summary.processing.selected_features.join(", "));
    step_ok("Training", &format!("cv score {:.4}", summary.training.cv_score));
    print_metrics(&summary.training.metrics);
    kv("Model", &summary.training.model_path.display().to_string());
    kv("Elapsed", &format!("{:.2}s", summary.elapsed_secs));
    println!();
    Ok(())
}

pub async fn cmd_serve(
    artifacts: &Path,
    host: Option<String>,
    port: Option<u16>,
    model: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = ServerConfig::default();
    if std::env::var("MODEL_PATH").is_err() {
        config.model_path = ArtifactPaths::new(artifacts).model_file();
    }
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(model) = model {
        config.model_path = model;
    }

    section("Serve");
    kv("Address", &format!("http://{}:{}", config.host, config.port));
    kv("Model", &config.model_path.display().to_string());
    println!();

    run_server(config).await
}

/// Split `name=value` into a field name and a numeric value
pub fn parse_field(field: &str) -> anyhow::Result<(String, f64)> {
    let (name, value) = field
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("field '{}' must look like name=value", field))?;
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("field '{}' has an empty name", field);
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("field '{}' has a non-numeric value", name))?;
    Ok((name.to_string(), value))
}

pub async fn cmd_predict(url: &str, fields: &[String]) -> anyhow::Result<()> {
    let mut body = Map::new();
    for field in fields {
        let (name, value) = parse_field(field)?;
        let number = serde_json::Number::from_f64(value)
            .ok_or_else(|| anyhow::anyhow!("field '{}' must be finite", name))?;
        if body.insert(name.clone(), Value::Number(number)).is_some() {
            anyhow::bail!("field '{}' given twice", name);
        }
    }

    let base = url::Url::parse(url)?;
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;

    let response = client.post(base.join("predict")?).json(&body).send().await?;
    let status = response.status();
    let payload: Value = response.json().await?;
    if !status.is_success() {
        let message = payload["message"].as_str().unwrap_or("unknown error");
        anyhow::bail!("server returned {}: {}", status, message);
    }

    let output = payload["output"]
        .as_i64()
        .ok_or_else(|| anyhow::anyhow!("response has no integer 'output'"))?;
    let label = match payload["label"].as_str() {
        Some(label) => label.to_string(),
        None => {
            let schema: FeatureSchema = client.get(base.join("schema")?).send().await?.json().await?;
            schema.decode_label(output).unwrap_or_default().to_string()
        }
    };

    section("Prediction");
    kv("Output", &output.to_string());
    kv("Label", &label);
    println!();
    Ok(())
}

/// Dispatch a parsed command line
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Ingest { from_dir } => cmd_ingest(&cli.config, &cli.artifacts, from_dir).await,
        Commands::Process => cmd_process(&cli.config, &cli.artifacts),
        Commands::Train { no_tracking } => cmd_train(&cli.config, &cli.artifacts, no_tracking),
        Commands::Run { from_dir, no_tracking } => {
            cmd_run(&cli.config, &cli.artifacts, from_dir, no_tracking).await
        }
        Commands::Serve { host, port, model } => cmd_serve(&cli.artifacts, host, port, model).await,
        Commands::Predict { url, fields } => cmd_predict(&url, &fields).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field() {
        assert_eq!(parse_field("lead_time=12").unwrap(), ("lead_time".to_string(), 12.0));
        assert_eq!(parse_field(" avg_price_per_room = 99.5 ").unwrap().1, 99.5);
        assert!(parse_field("lead_time").is_err());
        assert!(parse_field("=3").is_err());
        assert!(parse_field("lead_time=soon").is_err());
    }

    #[test]
    fn test_cli_parses_commands() {
        let cli = Cli::try_parse_from([
            "hotel-reservation",
            "--artifacts",
            "/tmp/out",
            "run",
            "--from-dir",
            "data",
            "--no-tracking",
        ])
        .unwrap();
        assert_eq!(cli.artifacts, PathBuf::from("/tmp/out"));
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(matches!(
            cli.command,
            Commands::Run { from_dir: Some(_), no_tracking: true }
        ));

        let cli = Cli::try_parse_from([
            "hotel-reservation",
            "predict",
            "--field",
            "lead_time=3",
            "--field",
            "arrival_month=7",
        ])
        .unwrap();
        match cli.command {
            Commands::Predict { url, fields } => {
                assert_eq!(url, "http://localhost:8000");
                assert_eq!(fields, vec!["lead_time=3", "arrival_month=7"]);
            }
            _ => panic!("expected predict"),
        }
    }
}
