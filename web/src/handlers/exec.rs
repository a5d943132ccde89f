//! The envelope endpoint.
//!
//! Every client action arrives here as `{action, payload}`. The answer is
//! always HTTP 200 with `{status: "success", data}` or
//! `{status: "error", error}`; transport-level failures are reserved for
//! the operational endpoints.

use crate::state::AppState;
use axum::{Json, body::Bytes, extract::State};
use kasir_core::error::PosError;
use kasir_runtime::{RequestEnvelope, ResponseEnvelope};

/// Dispatch one envelope.
///
/// ```text
/// POST /exec
/// POST /
/// ```
pub async fn exec(State(state): State<AppState>, body: Bytes) -> Json<ResponseEnvelope> {
    let envelope = match serde_json::from_slice::<RequestEnvelope>(&body) {
        Ok(envelope) => envelope,
        Err(error) => {
            tracing::warn!(error = %error, "Malformed request body");
            return Json(ResponseEnvelope::from_result(Err(PosError::validation(
                format!("malformed request: {error}"),
            ))));
        },
    };

    Json(state.service.handle(envelope).await)
}
