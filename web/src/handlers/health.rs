//! Health check endpoints.
//!
//! `/health` is liveness only. `/ready` also checks that every table of the
//! store exists, which is what bootstrap guarantees.

use crate::error::AppError;
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

/// Liveness response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `healthy`
    pub status: String,
    /// Crate version
    pub version: String,
}

/// Readiness response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadyResponse {
    /// Always `ready`
    pub status: String,
    /// Store location, credentials removed
    pub store: String,
}

/// Liveness check.
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Readiness check.
///
/// ```text
/// GET /ready
/// ```
///
/// # Errors
///
/// 503 when the store is unreachable or a table is missing.
pub async fn ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, AppError> {
    let missing = state.service.missing_tables().await.map_err(|error| {
        AppError::unavailable("store unreachable").with_source(anyhow::Error::new(error))
    })?;

    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|table| table.name()).collect();
        return Err(AppError::unavailable(format!(
            "missing tables: {}",
            names.join(", ")
        )));
    }

    Ok(Json(ReadyResponse {
        status: "ready".to_string(),
        store: state.service.store().location(),
    }))
}
