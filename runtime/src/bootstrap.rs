//! Schema bootstrap.
//!
//! Creates any of the five tables that does not exist yet, with its header
//! row. Run once at process start; request handlers assume the tables exist
//! and report `StoreUnavailable` when one has gone missing.

use kasir_core::error::PosError;
use kasir_core::tabular::{Table, TabularStore};

/// Create every missing table. Returns the tables created by this call.
///
/// # Errors
///
/// - `Store`: backend failure
pub async fn ensure_schema(store: &dyn TabularStore) -> Result<Vec<Table>, PosError> {
    let mut created = Vec::new();
    for table in Table::ALL {
        if store.ensure_table(table, table.headers()).await? {
            tracing::info!(table = %table, "Created table");
            created.push(table);
        }
    }
    if created.is_empty() {
        tracing::debug!(location = %store.location(), "Schema already present");
    }
    Ok(created)
}

/// Tables that do not exist in the store.
///
/// # Errors
///
/// - `Store`: backend failure
pub async fn missing_tables(store: &dyn TabularStore) -> Result<Vec<Table>, PosError> {
    let mut missing = Vec::new();
    for table in Table::ALL {
        if !store.has_table(table).await? {
            missing.push(table);
        }
    }
    Ok(missing)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::memory_store::MemoryTabularStore;

    #[tokio::test]
    async fn creates_only_missing_tables() {
        let store = MemoryTabularStore::new();
        store
            .ensure_table(Table::Products, Table::Products.headers())
            .await
            .unwrap();

        let created = ensure_schema(&store).await.unwrap();

        assert_eq!(
            created,
            vec![Table::Transactions, Table::Services, Table::Customers, Table::CashNotes]
        );
        assert!(missing_tables(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_run_is_a_noop() {
        let store = MemoryTabularStore::new();
        ensure_schema(&store).await.unwrap();

        assert!(ensure_schema(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn header_rows_are_written() {
        let store = MemoryTabularStore::new();
        ensure_schema(&store).await.unwrap();

        assert_eq!(store.headers(Table::CashNotes), Some(Table::CashNotes.headers().to_vec()));
        assert!(store.rows(Table::CashNotes).is_empty());
    }

    #[tokio::test]
    async fn reports_missing_tables() {
        let store = MemoryTabularStore::new();

        assert_eq!(missing_tables(&store).await.unwrap(), Table::ALL.to_vec());
    }
}
