//! Plain catalog maintenance: create, update and delete products and services.
//!
//! These writes touch one row each and have no cross-entity consistency
//! requirement, but they still run under the request lock so they never
//! interleave with a commit's read-modify-write of the products table.

use kasir_core::cell::Cell;
use kasir_core::environment::IdGenerator;
use kasir_core::error::PosError;
use kasir_core::tabular::{Table, TabularStore, find_row, product_col, service_col};
use kasir_core::types::{CatalogItemInput, CatalogKind, Money, Product, Service};
use serde::Serialize;

/// Result of a save.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SavedItem {
    /// ID of the saved entry
    pub id: String,
    /// Whether a new row was appended
    pub created: bool,
}

fn build_row(
    kind: CatalogKind,
    id: String,
    input: &CatalogItemInput,
    existing: Option<&[Cell]>,
) -> Vec<Cell> {
    match kind {
        CatalogKind::Product => {
            let current = existing.map(Product::from_row);
            Product {
                id,
                name: input.name.clone(),
                category: input.category.clone(),
                stock: input
                    .stock
                    .or_else(|| current.as_ref().map(|p| p.stock))
                    .unwrap_or(0),
                price: input.price,
                buy_price: input
                    .buy_price
                    .or_else(|| current.as_ref().map(|p| p.buy_price))
                    .unwrap_or(Money::ZERO),
                low_stock: input
                    .low_stock
                    .or_else(|| current.as_ref().map(|p| p.low_stock))
                    .unwrap_or(0),
            }
            .to_row()
        },
        CatalogKind::Service => Service {
            id,
            name: input.name.clone(),
            category: input.category.clone(),
            price: input.price,
        }
        .to_row(),
    }
}

/// Update the entry whose ID matches `input.id`, or append a new one.
///
/// Product fields left out of `input` keep their stored value on update and
/// default to zero on create.
///
/// # Errors
///
/// - `StoreUnavailable`: the catalog table does not exist
/// - `Store`: a read or write failed
pub async fn save_item(
    store: &dyn TabularStore,
    ids: &dyn IdGenerator,
    kind: CatalogKind,
    input: CatalogItemInput,
) -> Result<SavedItem, PosError> {
    let table = kind.table();
    let rows = store.read_rows(table).await?;

    let existing = input
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .and_then(|id| find_row(&rows, id_column(table), id).map(|position| (id, position)));

    if let Some((id, position)) = existing {
        let row = build_row(kind, id.to_string(), &input, rows.get(position).map(Vec::as_slice));
        store.write_rows(table, position, vec![row]).await?;
        tracing::info!(table = %table, id, "Catalog entry updated");
        return Ok(SavedItem {
            id: id.to_string(),
            created: false,
        });
    }

    let id = ids.next_id(kind.id_prefix());
    let row = build_row(kind, id.clone(), &input, None);
    store.append_row(table, row).await?;
    tracing::info!(table = %table, id = %id, "Catalog entry created");
    Ok(SavedItem { id, created: true })
}

/// Delete the entry with the given ID.
///
/// # Errors
///
/// - `NotFound`: no entry has this ID
/// - `StoreUnavailable`: the catalog table does not exist
/// - `Store`: a read or the delete failed
pub async fn delete_item(
    store: &dyn TabularStore,
    kind: CatalogKind,
    id: &str,
) -> Result<(), PosError> {
    let table = kind.table();
    let rows = store.read_rows(table).await?;

    let Some(position) = find_row(&rows, id_column(table), id.trim()) else {
        return Err(PosError::not_found(format!("no {table} entry with id {id}")));
    };

    store.delete_row(table, position).await?;
    tracing::info!(table = %table, id, "Catalog entry deleted");
    Ok(())
}

const fn id_column(table: Table) -> usize {
    match table {
        Table::Services => service_col::ID,
        _ => product_col::ID,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::memory_store::MemoryTabularStore;
    use kasir_core::environment::TimestampIdGenerator;
    use kasir_testing::fixtures::product_row;
    use kasir_testing::test_clock;
    use std::sync::Arc;

    fn input(id: Option<&str>, name: &str) -> CatalogItemInput {
        CatalogItemInput {
            id: id.map(str::to_string),
            name: name.to_string(),
            category: "Care".to_string(),
            stock: Some(12),
            price: Money::new(15_000),
            buy_price: Some(Money::new(10_000)),
            low_stock: Some(3),
        }
    }

    #[tokio::test]
    async fn new_product_gets_p_prefix() {
        let store = MemoryTabularStore::with_schema();
        let ids = TimestampIdGenerator::new(Arc::new(test_clock()));

        let saved = save_item(&store, &ids, CatalogKind::Product, input(None, "Shampoo"))
            .await
            .unwrap();

        assert!(saved.created);
        assert_eq!(saved.id, "P1735689600000");
        let product = Product::from_row(&store.rows(Table::Products)[0]);
        assert_eq!(product.name, "Shampoo");
        assert_eq!(product.stock, 12);
        assert_eq!(product.low_stock, 3);
    }

    #[tokio::test]
    async fn new_service_gets_l_prefix() {
        let store = MemoryTabularStore::with_schema();
        let ids = TimestampIdGenerator::new(Arc::new(test_clock()));

        let saved = save_item(&store, &ids, CatalogKind::Service, input(None, "Consult"))
            .await
            .unwrap();

        assert_eq!(saved.id, "L1735689600000");
        let service = Service::from_row(&store.rows(Table::Services)[0]);
        assert_eq!(service.price, Money::new(15_000));
    }

    #[tokio::test]
    async fn known_id_updates_in_place() {
        let store = MemoryTabularStore::with_schema();
        store.seed(Table::Products, vec![product_row("P1", 10), product_row("P2", 4)]);
        let ids = TimestampIdGenerator::new(Arc::new(test_clock()));
        let mut update = input(Some("P2"), "Renamed");
        update.stock = None;

        let saved = save_item(&store, &ids, CatalogKind::Product, update).await.unwrap();

        assert_eq!(saved, SavedItem { id: "P2".to_string(), created: false });
        let rows = store.rows(Table::Products);
        assert_eq!(rows.len(), 2);
        let product = Product::from_row(&rows[1]);
        assert_eq!(product.name, "Renamed");
        assert_eq!(product.stock, 4);
    }

    #[tokio::test]
    async fn unknown_id_creates_new_entry() {
        let store = MemoryTabularStore::with_schema();
        let ids = TimestampIdGenerator::new(Arc::new(test_clock()));

        let saved = save_item(&store, &ids, CatalogKind::Product, input(Some("P999"), "Ghost"))
            .await
            .unwrap();

        assert!(saved.created);
        assert_ne!(saved.id, "P999");
    }

    #[tokio::test]
    async fn delete_removes_row() {
        let store = MemoryTabularStore::with_schema();
        store.seed(Table::Products, vec![product_row("P1", 10), product_row("P2", 4)]);

        delete_item(&store, CatalogKind::Product, "P1").await.unwrap();

        let rows = store.rows(Table::Products);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][product_col::ID], Cell::text("P2"));
    }

    #[tokio::test]
    async fn delete_unknown_is_not_found() {
        let store = MemoryTabularStore::with_schema();

        let result = delete_item(&store, CatalogKind::Service, "L1").await;

        assert!(matches!(result, Err(PosError::NotFound(_))));
    }
}
