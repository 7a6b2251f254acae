//! Prediction server
//!
//! Loads the model artifact once at startup and serves:
//! - `POST /predict` - one booking in, `{"output": 0|1}` out
//! - `GET /schema` - the feature order and encodings the model expects
//! - `GET /health`
//! - `GET /` - an HTML form built from the schema

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use handlers::render_form;
pub use state::AppState;

use crate::export::ModelArtifact;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Default artifact location when `MODEL_PATH` is unset
pub const DEFAULT_MODEL_PATH: &str = "artifacts/models/model.json";

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            model_path: std::env::var("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_MODEL_PATH)),
        }
    }
}

/// Start the server with the given configuration
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();

    let artifact = ModelArtifact::load(&config.model_path)
        .map_err(|e| anyhow::anyhow!("failed to load model {}: {}", config.model_path.display(), e))?;
    info!(
        model = %config.model_path.display(),
        features = ?artifact.schema.feature_names(),
        trained_at = %artifact.metadata.created_at.to_rfc3339(),
        "Model loaded"
    );

    let state = Arc::new(AppState::new(artifact));
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "Server listening");

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
        let uptime = chrono::Utc::now().signed_duration_since(start_time);
        info!(uptime_secs = uptime.num_seconds(), "Shutdown signal received, stopping server");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        if std::env::var("API_PORT").is_err() {
            assert_eq!(config.port, 8000);
        }
        if std::env::var("MODEL_PATH").is_err() {
            assert_eq!(config.model_path, PathBuf::from(DEFAULT_MODEL_PATH));
        }
    }
}
