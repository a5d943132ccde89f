//! HTTP transport for the Kasir point-of-sale backend.
//!
//! A thin Axum shell around [`kasir_runtime::PosService`]:
//!
//! ```text
//! POST /exec  {action, payload}  ──►  PosService::handle  ──►  {status, data | error}
//! ```
//!
//! Read actions run straight against the store; mutating actions queue on the
//! service's request lock. The shell adds configuration, correlation IDs,
//! health and readiness, and the Prometheus scrape endpoint.

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::{Config, StoreBackend};
pub use error::AppError;
pub use middleware::{CORRELATION_ID_HEADER, CorrelationId, correlation_id_layer};
pub use routes::build_router;
pub use state::AppState;
