//! Process wiring: store selection, bootstrap, metrics, serving.

use crate::config::{Config, StoreBackend};
use crate::routes::build_router;
use crate::state::AppState;
use anyhow::Context;
use kasir_core::tabular::TabularStore;
use kasir_postgres::PostgresTabularStore;
use kasir_runtime::metrics::MetricsExporter;
use kasir_runtime::{MemoryTabularStore, PosService};
use std::sync::Arc;
use tracing::{error, info};

/// Open the configured backend.
///
/// # Errors
///
/// Returns error if the database is unreachable or its migrations fail.
pub async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn TabularStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            info!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryTabularStore::new()))
        },
        StoreBackend::Postgres => {
            let store = PostgresTabularStore::connect(
                &config.store.database_url,
                config.store.max_connections,
            )
            .await
            .context("connecting to PostgreSQL")?;
            store.migrate().await.context("running migrations")?;
            info!(location = %store.location(), "PostgreSQL store ready");
            Ok(Arc::new(store))
        },
    }
}

/// Build the service and its state: open the store, create missing tables,
/// install metrics.
///
/// # Errors
///
/// Returns error if the store cannot be opened or bootstrapped, or the
/// metrics recorder cannot be installed.
pub async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let store = open_store(config).await?;
    let service = PosService::new(store, config.pos_config());

    let created = service.bootstrap().await.context("bootstrapping tables")?;
    if !created.is_empty() {
        let names: Vec<&str> = created.iter().map(|table| table.name()).collect();
        info!(tables = %names.join(", "), "Created missing tables");
    }

    let state = AppState::new(service);
    if !config.server.metrics_enabled {
        return Ok(state);
    }

    let mut exporter = MetricsExporter::new();
    exporter.install().context("installing metrics recorder")?;
    Ok(state.with_metrics(exporter))
}

/// Serve until Ctrl+C or SIGTERM.
///
/// # Errors
///
/// Returns error if startup fails or the listener cannot be bound.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let state = build_state(&config).await?;
    let app = build_router(state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!(
        address = %address,
        backend = %config.store.backend,
        lock_wait_ms = config.lock_wait_ms,
        "Kasir server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C signal"),
        () = terminate => info!("Received SIGTERM signal"),
    }
}
