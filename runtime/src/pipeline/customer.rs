//! Customer aggregate upserts.
//!
//! One aggregate row per customer key. The key is the reference code when the
//! cart carries one, else the display name. A row matches when either its key
//! column or its name column equals the key; the first matching row in table
//! order wins. The request's key is trimmed, stored cells are compared as stored.
//!
//! Existing rows are updated cell by cell (visits, spend, history, last seen).
//! Those writes are independent store calls, so a failure between them leaves
//! the row partially updated.

use chrono::{DateTime, Utc};
use kasir_core::cell::{Cell, Row};
use kasir_core::error::PosError;
use kasir_core::tabular::{Table, TabularStore, customer_col};
use kasir_core::types::{
    CustomerAggregate, Money, TransactionRequest, decode_history, encode_history,
};
use serde::Serialize;
use std::collections::HashMap;

/// What the upsert did to the customers table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CustomerOutcome {
    /// A new aggregate row was appended
    Created {
        /// Matching key of the new row
        key: String,
    },
    /// An existing aggregate row was updated
    Updated {
        /// Matching key
        key: String,
        /// Visit count after this commit
        visits: i64,
    },
    /// Anonymous or blank customer; the table was not touched
    Skipped,
}

/// Index of the first row matching each key or name, in table order.
fn index_customers(rows: &[Row]) -> HashMap<String, usize> {
    let mut index = HashMap::with_capacity(rows.len() * 2);
    for (position, row) in rows.iter().enumerate() {
        for column in [customer_col::KEY, customer_col::NAME] {
            if let Some(key) = row.get(column).and_then(Cell::key) {
                index.entry(key).or_insert(position);
            }
        }
    }
    index
}

/// Record one visit by the request's customer.
///
/// # Errors
///
/// - `StoreUnavailable`: the customers table does not exist
/// - `Serialization`: the history could not be encoded
/// - `Validation`: the new total spend does not fit
/// - `Store`: a read or write failed
pub async fn upsert_customer(
    store: &dyn TabularStore,
    request: &TransactionRequest,
    transaction_id: &str,
    now: DateTime<Utc>,
) -> Result<CustomerOutcome, PosError> {
    if !request.has_customer() {
        tracing::debug!("Anonymous sale, customer aggregate skipped");
        return Ok(CustomerOutcome::Skipped);
    }

    let key = request.customer_key().trim().to_string();
    let rows = store.read_rows(Table::Customers).await?;

    let Some(&position) = index_customers(&rows).get(&key) else {
        let aggregate = CustomerAggregate::first_visit(
            request.customer_name.trim(),
            key.as_str(),
            transaction_id,
            request.total,
            now,
        );
        store.append_row(Table::Customers, aggregate.to_row()?).await?;
        tracing::debug!(customer_key = %key, "Created customer aggregate");
        return Ok(CustomerOutcome::Created { key });
    };

    let row = &rows[position];
    let cell = |column: usize| row.get(column).cloned().unwrap_or_default();

    let visits = cell(customer_col::VISITS).as_i64().unwrap_or(0).saturating_add(1);
    let spend = Money::from_cell(&cell(customer_col::TOTAL_SPEND))
        .checked_add(request.total)
        .ok_or_else(|| {
            PosError::validation(format!("total spend overflows for customer {key}"))
        })?;
    let mut history = decode_history(&cell(customer_col::HISTORY));
    history.push(transaction_id.to_string());

    store
        .set_cell(Table::Customers, position, customer_col::VISITS, Cell::Integer(visits))
        .await?;
    store
        .set_cell(Table::Customers, position, customer_col::TOTAL_SPEND, spend.into())
        .await?;
    store
        .set_cell(
            Table::Customers,
            position,
            customer_col::HISTORY,
            encode_history(&history)?,
        )
        .await?;
    store
        .set_cell(Table::Customers, position, customer_col::LAST_SEEN, Cell::Timestamp(now))
        .await?;

    tracing::debug!(
        customer_key = %key,
        visits,
        total_spend = %spend,
        "Updated customer aggregate"
    );
    Ok(CustomerOutcome::Updated { key, visits })
}
