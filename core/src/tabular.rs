//! Tabular store abstraction.
//!
//! The store is a collection of named tables, each an ordered sequence of
//! fixed-schema rows whose first column is the row key. It offers row and
//! row-range reads and writes with last-write-wins semantics and **no**
//! multi-row transactions. Consistency across rows is the caller's problem;
//! in this workspace it is solved by the request serializer in
//! `kasir-runtime`.
//!
//! # Addressing
//!
//! Every table has a header row. Stores keep it, but callers never address it:
//! row indices passed to [`TabularStore`] are 0-based indices into the **data**
//! rows, and column indices are 0-based positions within a row.
//!
//! # Implementations
//!
//! - `MemoryTabularStore` (in `kasir-testing`): in-process, deterministic
//! - `PostgresTabularStore` (in `kasir-postgres`): durable, `PostgreSQL` backed
//!
//! # Dyn Compatibility
//!
//! Methods return `Pin<Box<dyn Future>>` instead of using `async fn` so the
//! store can be shared as `Arc<dyn TabularStore>` across request handlers.

use crate::cell::{Cell, Row};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use thiserror::Error;

/// Boxed future returned by [`TabularStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// The five logical tables of the point-of-sale store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    /// One immutable row per completed sale
    Transactions,
    /// Stock-tracked catalog items
    Products,
    /// Catalog services (never stock-tracked)
    Services,
    /// One aggregate row per customer key
    Customers,
    /// Cash in/out notes
    CashNotes,
}

impl Table {
    /// Every table, in bootstrap order.
    pub const ALL: [Self; 5] = [
        Self::Transactions,
        Self::Products,
        Self::Services,
        Self::Customers,
        Self::CashNotes,
    ];

    /// Canonical wire name of the table.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Transactions => "transactions",
            Self::Products => "products",
            Self::Services => "services",
            Self::Customers => "customers",
            Self::CashNotes => "cash_notes",
        }
    }

    /// Header row written when the table is created.
    #[must_use]
    pub const fn headers(self) -> &'static [&'static str] {
        match self {
            Self::Transactions => &[
                "Transaction ID",
                "Timestamp",
                "Customer Name",
                "Customer Ref",
                "Items (JSON)",
                "Subtotal",
                "Discount",
                "Total",
                "Payment Method",
                "Operator",
            ],
            Self::Products => &[
                "Product ID",
                "Name",
                "Category",
                "Stock",
                "Sale Price",
                "Cost Price",
                "Low Stock Threshold",
            ],
            Self::Services => &["Service ID", "Name", "Category", "Price"],
            Self::Customers => &[
                "Customer Name",
                "Customer Key",
                "Visit Count",
                "Total Spend",
                "Transaction History (JSON)",
                "First Seen",
                "Last Seen",
            ],
            Self::CashNotes => &["Note ID", "Timestamp", "Type", "Description", "Amount"],
        }
    }

    /// Number of columns in the table.
    #[must_use]
    pub const fn width(self) -> usize {
        self.headers().len()
    }

    /// Column holding the row's timestamp, for tables that have one.
    #[must_use]
    pub const fn timestamp_column(self) -> Option<usize> {
        match self {
            Self::Transactions => Some(transaction_col::TIMESTAMP),
            Self::CashNotes => Some(cash_note_col::TIMESTAMP),
            Self::Products | Self::Services | Self::Customers => None,
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Table {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| StoreError::UnknownTable(s.to_string()))
    }
}

/// Column positions of the transactions table.
pub mod transaction_col {
    /// Transaction ID
    pub const ID: usize = 0;
    /// Timestamp of the sale
    pub const TIMESTAMP: usize = 1;
    /// Customer display name
    pub const CUSTOMER_NAME: usize = 2;
    /// Customer reference code
    pub const CUSTOMER_REF: usize = 3;
    /// Line items, JSON encoded
    pub const ITEMS: usize = 4;
    /// Subtotal
    pub const SUBTOTAL: usize = 5;
    /// Discount
    pub const DISCOUNT: usize = 6;
    /// Total
    pub const TOTAL: usize = 7;
    /// Payment method
    pub const PAYMENT_METHOD: usize = 8;
    /// Operator tag
    pub const OPERATOR: usize = 9;
}

/// Column positions of the products table.
pub mod product_col {
    /// Product ID
    pub const ID: usize = 0;
    /// Name
    pub const NAME: usize = 1;
    /// Category
    pub const CATEGORY: usize = 2;
    /// Stock (`-1` = unlimited)
    pub const STOCK: usize = 3;
    /// Sale price
    pub const PRICE: usize = 4;
    /// Cost price
    pub const COST_PRICE: usize = 5;
    /// Low-stock threshold
    pub const LOW_STOCK: usize = 6;
}

/// Column positions of the services table.
pub mod service_col {
    /// Service ID
    pub const ID: usize = 0;
    /// Name
    pub const NAME: usize = 1;
    /// Category
    pub const CATEGORY: usize = 2;
    /// Price
    pub const PRICE: usize = 3;
}

/// Column positions of the customers table.
pub mod customer_col {
    /// Display name
    pub const NAME: usize = 0;
    /// Customer key (reference code, else name)
    pub const KEY: usize = 1;
    /// Visit count
    pub const VISITS: usize = 2;
    /// Cumulative spend
    pub const TOTAL_SPEND: usize = 3;
    /// Transaction ID history, JSON encoded
    pub const HISTORY: usize = 4;
    /// First seen
    pub const FIRST_SEEN: usize = 5;
    /// Last seen
    pub const LAST_SEEN: usize = 6;
}

/// Column positions of the cash notes table.
pub mod cash_note_col {
    /// Note ID
    pub const ID: usize = 0;
    /// Timestamp
    pub const TIMESTAMP: usize = 1;
    /// `in` / `out`
    pub const KIND: usize = 2;
    /// Description
    pub const DESCRIPTION: usize = 3;
    /// Amount
    pub const AMOUNT: usize = 4;
}

/// Errors raised by tabular store implementations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The table has not been created in this store.
    #[error("Table not found: {0}")]
    TableMissing(Table),

    /// No table is known by this name.
    #[error("Unknown table name: {0}")]
    UnknownTable(String),

    /// Row or column index outside the table's current bounds.
    #[error("Out of range in {table}: row {row}, column {column:?}")]
    OutOfRange {
        /// Table addressed
        table: Table,
        /// Data row index
        row: usize,
        /// Column index, when a single cell was addressed
        column: Option<usize>,
    },

    /// Backend connection or query failure.
    #[error("Store backend error: {0}")]
    Backend(String),

    /// Stored data could not be encoded or decoded.
    #[error("Store serialization error: {0}")]
    Serialization(String),
}

/// Row-level access to a tabular store.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`. Individual calls are atomic with
/// respect to each other, but nothing spans two calls.
pub trait TabularStore: Send + Sync {
    /// Create the table with the given header row if it does not exist.
    ///
    /// Returns `true` when the table was created by this call.
    ///
    /// # Errors
    ///
    /// - `Backend`: storage failure
    fn ensure_table(&self, table: Table, headers: &'static [&'static str]) -> StoreFuture<'_, bool>;

    /// Whether the table exists.
    ///
    /// # Errors
    ///
    /// - `Backend`: storage failure
    fn has_table(&self, table: Table) -> StoreFuture<'_, bool>;

    /// Read every data row of the table, in table order.
    ///
    /// # Errors
    ///
    /// - `TableMissing`: the table does not exist
    /// - `Backend`: storage failure
    fn read_rows(&self, table: Table) -> StoreFuture<'_, Vec<Row>>;

    /// Overwrite the data rows starting at `start` with `rows`, in one operation.
    ///
    /// # Errors
    ///
    /// - `TableMissing`: the table does not exist
    /// - `OutOfRange`: the range extends past the last data row
    /// - `Backend`: storage failure
    fn write_rows(&self, table: Table, start: usize, rows: Vec<Row>) -> StoreFuture<'_, ()>;

    /// Append one row after the last data row.
    ///
    /// Returns the data index of the new row. Never overwrites an existing row.
    ///
    /// # Errors
    ///
    /// - `TableMissing`: the table does not exist
    /// - `Backend`: storage failure
    fn append_row(&self, table: Table, row: Row) -> StoreFuture<'_, usize>;

    /// Read one cell. Cells beyond the row's stored width read as empty.
    ///
    /// # Errors
    ///
    /// - `TableMissing`: the table does not exist
    /// - `OutOfRange`: no such data row
    /// - `Backend`: storage failure
    fn get_cell(&self, table: Table, row: usize, column: usize) -> StoreFuture<'_, Cell>;

    /// Overwrite one cell, widening the row when needed.
    ///
    /// # Errors
    ///
    /// - `TableMissing`: the table does not exist
    /// - `OutOfRange`: no such data row, or the column is past the table width
    /// - `Backend`: storage failure
    fn set_cell(&self, table: Table, row: usize, column: usize, value: Cell)
    -> StoreFuture<'_, ()>;

    /// Delete one data row, shifting later rows up.
    ///
    /// # Errors
    ///
    /// - `TableMissing`: the table does not exist
    /// - `OutOfRange`: no such data row
    /// - `Backend`: storage failure
    fn delete_row(&self, table: Table, row: usize) -> StoreFuture<'_, ()>;

    /// Human-readable location of the store, with credentials removed.
    fn location(&self) -> String;
}

/// Find the first data row whose key column matches `key`.
///
/// Table order is scan order; the first match wins.
#[must_use]
pub fn find_row(rows: &[Row], column: usize, key: &str) -> Option<usize> {
    rows.iter()
        .position(|row| row.get(column).is_some_and(|cell| cell.matches_key(key)))
}
