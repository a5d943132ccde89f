//! Transaction ledger appends.
//!
//! One immutable row per completed sale. The ledger only ever appends; no
//! code path in this workspace updates or deletes a transaction row.

use kasir_core::environment::IdGenerator;
use kasir_core::error::PosError;
use kasir_core::tabular::{Table, TabularStore};
use kasir_core::types::{LineItem, TransactionRecord, TransactionRequest};
use chrono::{DateTime, Utc};

/// Prefix of transaction IDs.
pub const TRANSACTION_ID_PREFIX: &str = "INV-";

/// Build the ledger record for a materialized cart.
///
/// The sale time is the request's `datetime`, or `now` when absent.
#[must_use]
pub fn build_record(
    id: String,
    request: &TransactionRequest,
    items: Vec<LineItem>,
    operator: &str,
    now: DateTime<Utc>,
) -> TransactionRecord {
    TransactionRecord {
        id,
        timestamp: request.datetime.unwrap_or(now),
        customer_name: request.customer_name.clone(),
        customer_ref: request.customer_ref().map(str::to_string),
        items,
        subtotal: request.subtotal,
        discount: request.discount,
        total: request.total,
        payment_method: request.payment_method.clone(),
        operator: operator.to_string(),
    }
}

/// Assign a transaction ID and append the sale to the transactions table.
///
/// `total = subtotal - discount` is the caller's responsibility and is not
/// checked here.
///
/// # Errors
///
/// - `StoreUnavailable`: the transactions table does not exist
/// - `Serialization`: the line items could not be encoded
/// - `Store`: the append failed
pub async fn append_transaction(
    store: &dyn TabularStore,
    ids: &dyn IdGenerator,
    request: &TransactionRequest,
    items: Vec<LineItem>,
    operator: &str,
    now: DateTime<Utc>,
) -> Result<TransactionRecord, PosError> {
    let record = build_record(ids.next_id(TRANSACTION_ID_PREFIX), request, items, operator, now);
    let row = record.to_row()?;

    store.append_row(Table::Transactions, row).await?;

    tracing::debug!(
        transaction_id = %record.id,
        lines = record.items.len(),
        total = %record.total,
        "Appended transaction to ledger"
    );
    Ok(record)
}
