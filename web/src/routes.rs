//! Router construction.

use crate::handlers::{exec, health, metrics};
use crate::middleware::correlation_id_layer;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the application router.
///
/// Routes:
/// - `POST /exec`, `POST /`: envelope dispatch
/// - `GET /health`: liveness
/// - `GET /ready`: readiness (every table present)
/// - `GET /metrics`: Prometheus scrape
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", post(exec::exec))
        .route("/exec", post(exec::exec))
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/metrics", get(metrics::metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(correlation_id_layer())
        .with_state(state)
}
