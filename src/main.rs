//! Hotel reservation cancellation pipeline - main entry point

use clap::Parser;
use hotel_reservation_ml::cli::{run, Cli};
use tracing::error;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hotel_reservation_ml=info".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!(error = %format!("{:#}", e), "Run failed");
        std::process::exit(1);
    }
}
