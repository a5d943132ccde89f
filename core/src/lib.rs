//! # Kasir Core
//!
//! Core types and traits for the Kasir point-of-sale backend.
//!
//! Kasir persists transactions, inventory, customers and cash notes in a
//! shared **tabular store**: named tables of ordered, fixed-schema rows with
//! row-level read-modify-write and no multi-row transactions. This crate holds
//! everything that does not perform I/O:
//!
//! - [`cell`]: loosely typed cell values and rows
//! - [`tabular`]: the [`TabularStore`](tabular::TabularStore) trait, table
//!   layouts and store errors
//! - [`types`]: carts, transaction records, catalog items, customer aggregates,
//!   cash notes
//! - [`environment`]: injected [`Clock`](environment::Clock) and
//!   [`IdGenerator`](environment::IdGenerator)
//! - [`error`]: the request-level [`PosError`](error::PosError)
//!
//! The commit pipeline that keeps these entities consistent lives in
//! `kasir-runtime`.

pub mod cell;
pub mod environment;
pub mod error;
pub mod tabular;
pub mod types;

// Re-export commonly used types
pub use cell::{Cell, Row};
pub use chrono::{DateTime, Utc};
pub use error::PosError;
pub use tabular::{StoreError, Table, TabularStore};
pub use types::Money;
