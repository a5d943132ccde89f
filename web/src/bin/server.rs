//! Kasir server.
//!
//! # Usage
//!
//! ```bash
//! # In-memory tables
//! cargo run --bin kasir-server
//!
//! # PostgreSQL
//! STORE_BACKEND=postgres DATABASE_URL=postgres://localhost/kasir cargo run --bin kasir-server
//! ```

use kasir_web::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.server.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        backend = %config.store.backend,
        port = config.server.port,
        "Starting Kasir server"
    );

    kasir_web::server::run(config).await
}
