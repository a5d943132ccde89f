//! Prometheus scrape endpoint.

use crate::error::AppError;
use crate::state::AppState;
use axum::{extract::State, http::header, response::IntoResponse};

/// Render the installed recorder in Prometheus text format.
///
/// ```text
/// GET /metrics
/// ```
///
/// # Errors
///
/// 404 when metrics are disabled, 500 when the exporter was attached without
/// installing its recorder.
pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let exporter = state
        .metrics
        .as_ref()
        .ok_or_else(|| AppError::not_found("metrics are disabled"))?;
    let body = exporter
        .render()
        .ok_or_else(|| AppError::internal("metrics recorder is not installed"))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}
