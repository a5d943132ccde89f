//! Inventory adjustment.
//!
//! One bulk read-modify-write pass over the products table:
//!
//! 1. load every product row once;
//! 2. index rows by product ID (first occurrence wins, matching a top-down
//!    scan);
//! 3. for each tracked product line, decrement the in-memory stock when the
//!    row exists and its stock is numeric and not the unlimited sentinel;
//! 4. if anything changed, write the whole row range back in one call.
//!
//! Unknown products and unlimited-stock products are skipped silently. Stock
//! may go negative; nothing floors it at zero.

use kasir_core::cell::Cell;
use kasir_core::error::PosError;
use kasir_core::tabular::{Table, TabularStore, product_col};
use kasir_core::types::{LineItem, UNLIMITED_STOCK};
use serde::Serialize;
use std::collections::HashMap;

/// Stock change applied to one product row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StockChange {
    /// Product ID
    pub product_id: String,
    /// Stock before this line
    pub before: i64,
    /// Stock after this line
    pub after: i64,
}

/// Outcome of one inventory pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StockAdjustment {
    /// Decrements applied, in cart order
    pub changes: Vec<StockChange>,
    /// Lines whose product has unlimited stock
    pub skipped_unlimited: usize,
    /// Lines whose product is not in the catalog
    pub skipped_missing: usize,
    /// Lines whose stock cell is not numeric, or whose decrement overflows
    pub skipped_invalid: usize,
    /// Whether the row range was written back
    pub written: bool,
}

/// Decrement stock for every tracked, finite-stock line of the cart.
///
/// # Errors
///
/// - `StoreUnavailable`: the products table does not exist
/// - `Store`: the read or the bulk write failed
pub async fn adjust_stock(
    store: &dyn TabularStore,
    items: &[LineItem],
) -> Result<StockAdjustment, PosError> {
    let mut adjustment = StockAdjustment::default();

    let tracked: Vec<&LineItem> = items.iter().filter(|i| i.is_tracked_product()).collect();
    if tracked.is_empty() {
        return Ok(adjustment);
    }

    let mut rows = store.read_rows(Table::Products).await?;
    if rows.is_empty() {
        adjustment.skipped_missing = tracked.len();
        return Ok(adjustment);
    }

    let mut index: HashMap<String, usize> = HashMap::with_capacity(rows.len());
    for (position, row) in rows.iter().enumerate() {
        if let Some(id) = row.get(product_col::ID).and_then(Cell::key) {
            index.entry(id).or_insert(position);
        }
    }

    for item in tracked {
        let Some(product_id) = item.catalog_id() else {
            continue;
        };
        let Some(&position) = index.get(product_id) else {
            adjustment.skipped_missing += 1;
            continue;
        };

        let row = &mut rows[position];
        let Some(current) = row.get(product_col::STOCK).and_then(Cell::as_i64) else {
            adjustment.skipped_invalid += 1;
            continue;
        };
        if current == UNLIMITED_STOCK {
            adjustment.skipped_unlimited += 1;
            continue;
        }
        let Some(next) = current.checked_sub(item.quantity) else {
            adjustment.skipped_invalid += 1;
            continue;
        };

        if row.len() <= product_col::STOCK {
            row.resize(product_col::STOCK + 1, Cell::Empty);
        }
        row[product_col::STOCK] = Cell::Integer(next);
        adjustment.changes.push(StockChange {
            product_id: product_id.to_string(),
            before: current,
            after: next,
        });
    }

    if !adjustment.changes.is_empty() {
        store.write_rows(Table::Products, 0, rows).await?;
        adjustment.written = true;
    }

    tracing::debug!(
        decrements = adjustment.changes.len(),
        skipped_unlimited = adjustment.skipped_unlimited,
        skipped_missing = adjustment.skipped_missing,
        skipped_invalid = adjustment.skipped_invalid,
        "Inventory adjusted"
    );
    Ok(adjustment)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::memory_store::{MemoryTabularStore, StoreOp};
    use kasir_core::types::{ItemKind, Money};
    use kasir_testing::fixtures::product_row;

    fn sold(id: &str, kind: ItemKind, quantity: i64) -> LineItem {
        LineItem {
            id: Some(id.to_string()),
            name: id.to_string(),
            kind,
            price: Money::new(1000),
            quantity,
            category: None,
        }
    }

    fn stock_of(store: &MemoryTabularStore, row: usize) -> Cell {
        store.rows(Table::Products)[row][product_col::STOCK].clone()
    }

    #[tokio::test]
    async fn decrements_tracked_products() {
        let store = MemoryTabularStore::with_schema();
        store.seed(Table::Products, vec![product_row("P1", 10), product_row("P2", 5)]);

        let adjustment = adjust_stock(&store, &[sold("P1", ItemKind::Product, 2)])
            .await
            .unwrap();

        assert!(adjustment.written);
        assert_eq!(
            adjustment.changes,
            vec![StockChange { product_id: "P1".to_string(), before: 10, after: 8 }]
        );
        assert_eq!(stock_of(&store, 0), Cell::Integer(8));
        assert_eq!(stock_of(&store, 1), Cell::Integer(5));
    }

    #[tokio::test]
    async fn repeated_lines_accumulate() {
        let store = MemoryTabularStore::with_schema();
        store.seed(Table::Products, vec![product_row("P1", 10)]);

        adjust_stock(
            &store,
            &[sold("P1", ItemKind::Product, 2), sold("P1", ItemKind::Product, 3)],
        )
        .await
        .unwrap();

        assert_eq!(stock_of(&store, 0), Cell::Integer(5));
    }

    #[tokio::test]
    async fn unlimited_and_unknown_products_are_skipped() {
        let store = MemoryTabularStore::with_schema();
        store.seed(Table::Products, vec![product_row("P1", UNLIMITED_STOCK)]);
        let writes_before = store.op_count(StoreOp::WriteRows);

        let adjustment = adjust_stock(
            &store,
            &[sold("P1", ItemKind::Product, 2), sold("P404", ItemKind::Product, 1)],
        )
        .await
        .unwrap();

        assert!(!adjustment.written);
        assert_eq!(adjustment.skipped_unlimited, 1);
        assert_eq!(adjustment.skipped_missing, 1);
        assert_eq!(stock_of(&store, 0), Cell::Integer(UNLIMITED_STOCK));
        assert_eq!(store.op_count(StoreOp::WriteRows), writes_before);
    }

    #[tokio::test]
    async fn services_do_not_touch_inventory() {
        let store = MemoryTabularStore::with_schema();
        store.seed(Table::Products, vec![product_row("L1", 3)]);

        let adjustment = adjust_stock(&store, &[sold("L1", ItemKind::Service, 1)])
            .await
            .unwrap();

        assert_eq!(adjustment, StockAdjustment::default());
        assert_eq!(store.op_count(StoreOp::ReadRows), 0);
    }

    #[tokio::test]
    async fn stock_may_go_negative() {
        let store = MemoryTabularStore::with_schema();
        store.seed(Table::Products, vec![product_row("P1", 1)]);

        adjust_stock(&store, &[sold("P1", ItemKind::Product, 3)]).await.unwrap();

        assert_eq!(stock_of(&store, 0), Cell::Integer(-2));
    }

    #[tokio::test]
    async fn non_numeric_stock_is_skipped() {
        let store = MemoryTabularStore::with_schema();
        let mut row = product_row("P1", 0);
        row[product_col::STOCK] = Cell::text("n/a");
        store.seed(Table::Products, vec![row, product_row("P2", 4)]);

        let adjustment = adjust_stock(
            &store,
            &[sold("P1", ItemKind::Product, 1), sold("P2", ItemKind::Product, 1)],
        )
        .await
        .unwrap();

        assert_eq!(adjustment.skipped_invalid, 1);
        assert_eq!(stock_of(&store, 0), Cell::text("n/a"));
        assert_eq!(stock_of(&store, 1), Cell::Integer(3));
    }

    #[tokio::test]
    async fn numeric_text_stock_is_decremented() {
        let store = MemoryTabularStore::with_schema();
        let mut row = product_row("P1", 0);
        row[product_col::STOCK] = Cell::text("12");
        store.seed(Table::Products, vec![row]);

        adjust_stock(&store, &[sold("P1", ItemKind::Product, 2)]).await.unwrap();

        assert_eq!(stock_of(&store, 0), Cell::Integer(10));
    }

    #[tokio::test]
    async fn duplicate_ids_decrement_first_row_only() {
        let store = MemoryTabularStore::with_schema();
        store.seed(Table::Products, vec![product_row("P1", 10), product_row("P1", 10)]);

        adjust_stock(&store, &[sold("P1", ItemKind::Product, 1)]).await.unwrap();

        assert_eq!(stock_of(&store, 0), Cell::Integer(9));
        assert_eq!(stock_of(&store, 1), Cell::Integer(10));
    }
}
