//! # Kasir Runtime
//!
//! Request handling for the Kasir point-of-sale backend.
//!
//! ## Core Components
//!
//! - **Request Serializer** ([`serializer`]): one process-wide lock with a
//!   bounded wait; every mutating request runs inside it
//! - **Commit Pipeline** ([`pipeline`]): materialize custom items, append the
//!   ledger row, adjust stock, upsert the customer aggregate, in that order
//! - **Collaborators**: [`cash_notes`], [`catalog`], [`reports`], [`bootstrap`]
//! - **Dispatch** ([`dispatch`], [`service`]): the `{action, payload}` envelope
//!   and the [`PosService`] that routes it
//! - **Metrics** ([`metrics`]): Prometheus counters and histograms
//!
//! ## Example
//!
//! ```ignore
//! use kasir_runtime::{PosConfig, PosService, RequestEnvelope};
//!
//! let service = PosService::new(store, PosConfig::default());
//! service.bootstrap().await?;
//!
//! let response = service
//!     .handle(RequestEnvelope::new("recordTransaction", payload))
//!     .await;
//! ```

pub mod bootstrap;
pub mod cash_notes;
pub mod catalog;
pub mod dispatch;
pub mod memory_store;
pub mod metrics;
pub mod pipeline;
pub mod reports;
pub mod serializer;
pub mod service;

pub use dispatch::{Action, RequestEnvelope, ResponseEnvelope};
pub use memory_store::{MemoryTabularStore, StoreOp};
pub use pipeline::{CommitPipeline, CommitReceipt, CommitStep, CustomerOutcome};
pub use serializer::RequestSerializer;
pub use service::{PosConfig, PosService};
