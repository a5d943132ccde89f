//! Read-only table dumps and date-range reports.
//!
//! Nothing here takes the request lock. A read that races a commit may see
//! some of that commit's writes and not others.

use chrono::{DateTime, NaiveDate, Utc};
use kasir_core::cell::{Row, row_to_json};
use kasir_core::error::PosError;
use kasir_core::tabular::{StoreError, Table, TabularStore};
use kasir_core::types::{CatalogItem, Product, Service};
use serde::{Deserialize, Serialize};

/// Payload of `getInitialData`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialData {
    /// Products, typed
    pub products: Vec<CatalogItem>,
    /// Services, typed
    pub services: Vec<CatalogItem>,
    /// Raw transaction rows
    pub transactions: Vec<serde_json::Value>,
    /// Raw customer rows
    pub customers: Vec<serde_json::Value>,
    /// Raw cash note rows
    pub cash_notes: Vec<serde_json::Value>,
}

/// Read every data row, treating a missing table as empty.
///
/// # Errors
///
/// - `Store`: backend failure
pub async fn read_table(store: &dyn TabularStore, table: Table) -> Result<Vec<Row>, PosError> {
    match store.read_rows(table).await {
        Ok(rows) => Ok(rows),
        Err(StoreError::TableMissing(_)) => Ok(Vec::new()),
        Err(other) => Err(other.into()),
    }
}

/// Rows of a table in their presented JSON form.
///
/// # Errors
///
/// - `Store`: backend failure
pub async fn sheet_data(
    store: &dyn TabularStore,
    table: Table,
) -> Result<Vec<serde_json::Value>, PosError> {
    let rows = read_table(store, table).await?;
    Ok(rows.iter().map(|row| row_to_json(row)).collect())
}

/// Catalog plus raw history, as the front-end loads it on start.
///
/// # Errors
///
/// - `Store`: backend failure
pub async fn initial_data(store: &dyn TabularStore) -> Result<InitialData, PosError> {
    let products = read_table(store, Table::Products)
        .await?
        .iter()
        .map(|row| CatalogItem::Product(Product::from_row(row)))
        .collect();
    let services = read_table(store, Table::Services)
        .await?
        .iter()
        .map(|row| CatalogItem::Service(Service::from_row(row)))
        .collect();

    Ok(InitialData {
        products,
        services,
        transactions: sheet_data(store, Table::Transactions).await?,
        customers: sheet_data(store, Table::Customers).await?,
        cash_notes: sheet_data(store, Table::CashNotes).await?,
    })
}

/// Payload of `getFilteredData`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeQuery {
    /// Table to filter
    #[serde(default)]
    pub sheet_name: Option<String>,
    /// Inclusive start, `YYYY-MM-DD` or RFC 3339
    #[serde(default)]
    pub start_date: Option<String>,
    /// Inclusive end, `YYYY-MM-DD` (whole day) or RFC 3339
    #[serde(default)]
    pub end_date: Option<String>,
}

/// A validated date-range filter over one timestamped table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateRangeFilter {
    table: Table,
    timestamp_column: usize,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Clone, Copy)]
enum Bound {
    Start,
    End,
}

fn parse_bound(field: &str, value: &str, bound: Bound) -> Result<DateTime<Utc>, PosError> {
    let value = value.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| PosError::validation(format!("{field} is not a valid date: {value}")))?;
    let at = match bound {
        Bound::Start => date.and_hms_opt(0, 0, 0),
        Bound::End => date.and_hms_nano_opt(23, 59, 59, 999_999_999),
    };
    at.map(|at| at.and_utc())
        .ok_or_else(|| PosError::validation(format!("{field} is out of range: {value}")))
}

fn required<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str, PosError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| PosError::validation(format!("{field} is required")))
}

impl DateRangeFilter {
    /// Validate a query.
    ///
    /// # Errors
    ///
    /// `Validation` when a field is missing, a date does not parse, the range
    /// is inverted, or the table has no timestamp column.
    pub fn from_query(query: &DateRangeQuery) -> Result<Self, PosError> {
        let table: Table = required("sheetName", query.sheet_name.as_deref())?.parse()?;
        let timestamp_column = table
            .timestamp_column()
            .ok_or_else(|| PosError::validation(format!("{table} cannot be filtered by date")))?;

        let start = parse_bound(
            "startDate",
            required("startDate", query.start_date.as_deref())?,
            Bound::Start,
        )?;
        let end = parse_bound(
            "endDate",
            required("endDate", query.end_date.as_deref())?,
            Bound::End,
        )?;
        if start > end {
            return Err(PosError::validation("startDate is after endDate"));
        }

        Ok(Self {
            table,
            timestamp_column,
            start,
            end,
        })
    }

    /// Table being filtered.
    #[must_use]
    pub const fn table(&self) -> Table {
        self.table
    }

    /// Whether a row's timestamp lies in the range. Rows without one never do.
    #[must_use]
    pub fn matches(&self, row: &[kasir_core::Cell]) -> bool {
        row.get(self.timestamp_column)
            .and_then(kasir_core::Cell::as_timestamp)
            .is_some_and(|at| self.start <= at && at <= self.end)
    }

    /// Rows of the table inside the range, in table order, presented as JSON.
    ///
    /// # Errors
    ///
    /// - `Store`: backend failure
    pub async fn apply(
        &self,
        store: &dyn TabularStore,
    ) -> Result<Vec<serde_json::Value>, PosError> {
        let rows = read_table(store, self.table).await?;
        Ok(rows
            .iter()
            .filter(|row| self.matches(row))
            .map(|row| row_to_json(row))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::memory_store::{MemoryTabularStore, StoreOp};
    use kasir_core::Cell;
    use kasir_core::tabular::transaction_col;
    use kasir_testing::fixtures::product_row;

    fn query(sheet: &str, start: &str, end: &str) -> DateRangeQuery {
        DateRangeQuery {
            sheet_name: Some(sheet.to_string()),
            start_date: Some(start.to_string()),
            end_date: Some(end.to_string()),
        }
    }

    fn sale_at(id: &str, at: &str) -> Row {
        let mut row = vec![Cell::Empty; Table::Transactions.width()];
        row[transaction_col::ID] = Cell::text(id);
        row[transaction_col::TIMESTAMP] = Cell::Timestamp(
            DateTime::parse_from_rfc3339(at).unwrap().with_timezone(&Utc),
        );
        row
    }

    #[tokio::test]
    async fn missing_tables_read_as_empty() {
        let store = MemoryTabularStore::new();

        let data = initial_data(&store).await.unwrap();

        assert!(data.products.is_empty());
        assert!(data.cash_notes.is_empty());
    }

    #[tokio::test]
    async fn backend_failures_surface() {
        let store = MemoryTabularStore::with_schema();
        store.fail_on(Table::Customers, StoreOp::ReadRows);

        assert!(matches!(
            sheet_data(&store, Table::Customers).await,
            Err(PosError::Store(_))
        ));
    }

    #[tokio::test]
    async fn initial_data_types_catalog_entries() {
        let store = MemoryTabularStore::with_schema();
        store.seed(Table::Products, vec![product_row("P1", 10)]);

        let data = initial_data(&store).await.unwrap();
        let value = serde_json::to_value(&data).unwrap();

        assert_eq!(value["products"][0]["type"], "product");
        assert_eq!(value["products"][0]["stock"], 10);
        assert!(value["cashNotes"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn bare_end_date_covers_whole_day() {
        let store = MemoryTabularStore::with_schema();
        store.seed(
            Table::Transactions,
            vec![
                sale_at("INV-1", "2024-12-31T23:59:59Z"),
                sale_at("INV-2", "2025-01-01T00:00:00Z"),
                sale_at("INV-3", "2025-01-02T23:30:00Z"),
                sale_at("INV-4", "2025-01-03T00:00:00Z"),
            ],
        );

        let filter =
            DateRangeFilter::from_query(&query("transactions", "2025-01-01", "2025-01-02"))
                .unwrap();
        let rows = filter.apply(&store).await.unwrap();

        let ids: Vec<&str> = rows.iter().map(|r| r[0].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["INV-2", "INV-3"]);
    }

    #[test]
    fn rfc3339_bounds_are_exact() {
        let filter = DateRangeFilter::from_query(&query(
            "cash_notes",
            "2025-01-01T08:00:00Z",
            "2025-01-01T09:00:00+00:00",
        ))
        .unwrap();
        assert_eq!(filter.table(), Table::CashNotes);
    }

    #[test]
    fn invalid_queries_are_rejected() {
        let cases = [
            DateRangeQuery::default(),
            query("products", "2025-01-01", "2025-01-02"),
            query("inventory", "2025-01-01", "2025-01-02"),
            query("transactions", "yesterday", "2025-01-02"),
            query("transactions", "2025-01-03", "2025-01-02"),
            query("transactions", "2025-01-01", " "),
        ];
        for case in &cases {
            assert!(
                matches!(DateRangeFilter::from_query(case), Err(PosError::Validation(_))),
                "{case:?}"
            );
        }
    }

    #[test]
    fn rows_without_timestamp_never_match() {
        let filter =
            DateRangeFilter::from_query(&query("transactions", "2000-01-01", "2100-01-01"))
                .unwrap();
        let mut row = vec![Cell::Empty; Table::Transactions.width()];
        assert!(!filter.matches(&row));
        row[transaction_col::TIMESTAMP] = Cell::text("2025-01-01T00:00:00Z");
        assert!(filter.matches(&row));
    }
}
