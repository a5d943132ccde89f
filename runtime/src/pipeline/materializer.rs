//! Ad-hoc item materialization.
//!
//! Custom cart lines (see [`LineItem::is_transient`]) have no catalog
//! identity. Before the sale is recorded each one is minted into a permanent
//! product row with unlimited stock, and the cart line is rewritten in place
//! to carry the new ID as a tracked product.
//!
//! There is no deduplication across transactions: selling "Gift Wrap" as a
//! custom item twice creates two catalog rows. Within one cart, lines sharing
//! the same transient ID share one new row.

use kasir_core::environment::IdGenerator;
use kasir_core::error::PosError;
use kasir_core::tabular::{Table, TabularStore};
use kasir_core::types::{
    DEFAULT_CUSTOM_CATEGORY, ItemKind, LineItem, Money, Product, UNLIMITED_STOCK,
};
use serde::Serialize;
use std::collections::HashMap;

/// Transient-to-permanent ID mapping for one materialized item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MaterializedItem {
    /// ID the cart line carried, if any
    pub transient_id: Option<String>,
    /// Newly minted product ID
    pub permanent_id: String,
}

/// Mint a product row for every transient line and rewrite the lines in place.
///
/// # Errors
///
/// - `StoreUnavailable`: the products table does not exist
/// - `Store`: appending a product row failed; lines materialized before the
///   failure keep their new IDs and rows
pub async fn materialize_custom_items(
    store: &dyn TabularStore,
    ids: &dyn IdGenerator,
    items: &mut [LineItem],
) -> Result<Vec<MaterializedItem>, PosError> {
    let mut minted: Vec<MaterializedItem> = Vec::new();
    let mut by_transient: HashMap<String, String> = HashMap::new();

    for item in items.iter_mut().filter(|item| item.is_transient()) {
        let transient_id = item.catalog_id().map(str::to_string);

        let already_minted = transient_id
            .as_ref()
            .and_then(|t| by_transient.get(t))
            .cloned();

        let permanent_id = match already_minted {
            Some(existing) => existing,
            None => {
                let product = Product {
                    id: ids.next_id("P"),
                    name: item.name.clone(),
                    category: item
                        .category
                        .clone()
                        .filter(|c| !c.trim().is_empty())
                        .unwrap_or_else(|| DEFAULT_CUSTOM_CATEGORY.to_string()),
                    stock: UNLIMITED_STOCK,
                    price: item.price,
                    buy_price: Money::ZERO,
                    low_stock: 0,
                };
                store.append_row(Table::Products, product.to_row()).await?;

                tracing::debug!(
                    transient_id = ?transient_id,
                    product_id = %product.id,
                    name = %product.name,
                    "Materialized custom item"
                );

                if let Some(transient) = &transient_id {
                    by_transient.insert(transient.clone(), product.id.clone());
                }
                minted.push(MaterializedItem {
                    transient_id: transient_id.clone(),
                    permanent_id: product.id.clone(),
                });
                product.id
            },
        };

        item.id = Some(permanent_id);
        item.kind = ItemKind::Product;
        if item.category.as_deref().is_none_or(|c| c.trim().is_empty()) {
            item.category = Some(DEFAULT_CUSTOM_CATEGORY.to_string());
        }
    }

    Ok(minted)
}
