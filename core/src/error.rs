//! Request-level error type.
//!
//! Every failure that can abort a request maps to one [`PosError`] variant.
//! The transport flattens it to `{status: "error", error: <Display>}`, so the
//! `#[error]` strings are user-facing.

use crate::tabular::{StoreError, Table};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced to the caller of a point-of-sale action.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PosError {
    /// The global request lock was not acquired within the wait bound.
    ///
    /// The pipeline never started; nothing was written.
    #[error("Request lock not acquired within {0:?}")]
    LockTimeout(Duration),

    /// Malformed action, payload, or filter.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A referenced catalog or customer row does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A table the request needs has not been created.
    #[error("Table unavailable: {0}")]
    StoreUnavailable(Table),

    /// Any other store failure.
    #[error(transparent)]
    Store(StoreError),

    /// A value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PosError {
    /// Create a validation error
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a not-found error
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Short machine-readable kind, used as a metrics label.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::LockTimeout(_) => "lock_timeout",
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::Store(_) => "store",
            Self::Serialization(_) => "serialization",
        }
    }
}

impl From<StoreError> for PosError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::TableMissing(table) => Self::StoreUnavailable(table),
            StoreError::UnknownTable(name) => {
                Self::Validation(format!("invalid table name: {name}"))
            },
            other => Self::Store(other),
        }
    }
}

impl From<serde_json::Error> for PosError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

/// Result alias for point-of-sale operations.
pub type Result<T> = std::result::Result<T, PosError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_table_is_store_unavailable() {
        let error: PosError = StoreError::TableMissing(Table::Customers).into();
        assert_eq!(error, PosError::StoreUnavailable(Table::Customers));
        assert_eq!(error.to_string(), "Table unavailable: customers");
    }

    #[test]
    fn unknown_table_is_validation() {
        let error: PosError = StoreError::UnknownTable("stock".to_string()).into();
        assert_eq!(error.kind(), "validation");
    }

    #[test]
    fn backend_errors_pass_through() {
        let error: PosError = StoreError::Backend("connection reset".to_string()).into();
        assert_eq!(error.to_string(), "Store backend error: connection reset");
    }
}
