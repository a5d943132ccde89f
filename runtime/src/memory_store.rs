//! In-memory tabular store.
//!
//! Backs the server's `memory` backend and the test suites:
//! - every call is atomic (one lock acquisition), nothing spans two calls
//! - failures can be injected per table and operation
//! - calls can optionally yield to the scheduler first, which widens the
//!   window for interleavings between concurrent requests

use kasir_core::cell::{Cell, Row};
use kasir_core::tabular::{StoreError, StoreFuture, Table, TabularStore};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{PoisonError, RwLock};

/// Store operations, for fault injection and call counting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// `ensure_table`
    EnsureTable,
    /// `has_table`
    HasTable,
    /// `read_rows`
    ReadRows,
    /// `write_rows`
    WriteRows,
    /// `append_row`
    AppendRow,
    /// `get_cell`
    GetCell,
    /// `set_cell`
    SetCell,
    /// `delete_row`
    DeleteRow,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone)]
struct MemoryTable {
    headers: &'static [&'static str],
    rows: Vec<Row>,
}

/// In-memory tabular store.
///
/// # Example
///
/// ```
/// use kasir_runtime::MemoryTabularStore;
/// use kasir_core::tabular::{Table, TabularStore};
/// use kasir_core::Cell;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryTabularStore::with_schema();
/// store.append_row(Table::Products, vec![Cell::text("P1")]).await?;
/// assert_eq!(store.rows(Table::Products).len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryTabularStore {
    tables: RwLock<BTreeMap<Table, MemoryTable>>,
    faults: RwLock<HashSet<(Table, StoreOp)>>,
    calls: RwLock<HashMap<StoreOp, usize>>,
    yield_each_call: bool,
}

impl MemoryTabularStore {
    /// Create a store with no tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with every table present and empty.
    #[must_use]
    pub fn with_schema() -> Self {
        let store = Self::new();
        {
            let mut tables = store.tables.write().unwrap_or_else(PoisonError::into_inner);
            for table in Table::ALL {
                tables.insert(
                    table,
                    MemoryTable {
                        headers: table.headers(),
                        rows: Vec::new(),
                    },
                );
            }
        }
        store
    }

    /// Yield to the scheduler at the start of every call.
    #[must_use]
    pub const fn yielding(mut self) -> Self {
        self.yield_each_call = true;
        self
    }

    /// Snapshot of a table's data rows. Missing tables read as empty.
    #[must_use]
    pub fn rows(&self, table: Table) -> Vec<Row> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Header row of a table, if it exists.
    #[must_use]
    pub fn headers(&self, table: Table) -> Option<Vec<&'static str>> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&table)
            .map(|t| t.headers.to_vec())
    }

    /// Append rows directly, creating the table if needed. Not counted as a call.
    pub fn seed(&self, table: Table, rows: Vec<Row>) {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(table)
            .or_insert_with(|| MemoryTable {
                headers: table.headers(),
                rows: Vec::new(),
            })
            .rows
            .extend(rows);
    }

    /// Drop a table.
    pub fn drop_table(&self, table: Table) {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&table);
    }

    /// Make every future `op` on `table` fail with a backend error.
    pub fn fail_on(&self, table: Table, op: StoreOp) {
        self.faults
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((table, op));
    }

    /// Remove every injected failure.
    pub fn clear_faults(&self) {
        self.faults.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Number of calls of `op` made so far, across all tables.
    #[must_use]
    pub fn op_count(&self, op: StoreOp) -> usize {
        self.calls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&op)
            .copied()
            .unwrap_or(0)
    }

    async fn enter(&self, table: Table, op: StoreOp) -> Result<(), StoreError> {
        if self.yield_each_call {
            tokio::task::yield_now().await;
        }
        *self
            .calls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(op)
            .or_insert(0) += 1;

        if self
            .faults
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(table, op))
        {
            return Err(StoreError::Backend(format!("injected failure: {op} on {table}")));
        }
        Ok(())
    }

    fn with_table<T>(
        &self,
        table: Table,
        f: impl FnOnce(&mut MemoryTable) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let entry = tables.get_mut(&table).ok_or(StoreError::TableMissing(table))?;
        f(entry)
    }
}

impl TabularStore for MemoryTabularStore {
    fn ensure_table(
        &self,
        table: Table,
        headers: &'static [&'static str],
    ) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            self.enter(table, StoreOp::EnsureTable).await?;
            let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
            if tables.contains_key(&table) {
                return Ok(false);
            }
            tables.insert(table, MemoryTable { headers, rows: Vec::new() });
            Ok(true)
        })
    }

    fn has_table(&self, table: Table) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            self.enter(table, StoreOp::HasTable).await?;
            Ok(self
                .tables
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .contains_key(&table))
        })
    }

    fn read_rows(&self, table: Table) -> StoreFuture<'_, Vec<Row>> {
        Box::pin(async move {
            self.enter(table, StoreOp::ReadRows).await?;
            self.with_table(table, |t| Ok(t.rows.clone()))
        })
    }

    fn write_rows(&self, table: Table, start: usize, rows: Vec<Row>) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.enter(table, StoreOp::WriteRows).await?;
            self.with_table(table, |t| {
                let end = start + rows.len();
                if end > t.rows.len() {
                    return Err(StoreError::OutOfRange {
                        table,
                        row: end.saturating_sub(1).max(start),
                        column: None,
                    });
                }
                for (slot, row) in t.rows[start..end].iter_mut().zip(rows) {
                    *slot = row;
                }
                Ok(())
            })
        })
    }

    fn append_row(&self, table: Table, row: Row) -> StoreFuture<'_, usize> {
        Box::pin(async move {
            self.enter(table, StoreOp::AppendRow).await?;
            self.with_table(table, |t| {
                t.rows.push(row);
                Ok(t.rows.len() - 1)
            })
        })
    }

    fn get_cell(&self, table: Table, row: usize, column: usize) -> StoreFuture<'_, Cell> {
        Box::pin(async move {
            self.enter(table, StoreOp::GetCell).await?;
            self.with_table(table, |t| {
                let cells = t.rows.get(row).ok_or(StoreError::OutOfRange {
                    table,
                    row,
                    column: Some(column),
                })?;
                Ok(cells.get(column).cloned().unwrap_or_default())
            })
        })
    }

    fn set_cell(
        &self,
        table: Table,
        row: usize,
        column: usize,
        value: Cell,
    ) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.enter(table, StoreOp::SetCell).await?;
            self.with_table(table, |t| {
                let width = t.headers.len();
                let out_of_range = StoreError::OutOfRange {
                    table,
                    row,
                    column: Some(column),
                };
                if column >= width {
                    return Err(out_of_range);
                }
                let cells = t.rows.get_mut(row).ok_or(out_of_range)?;
                if cells.len() <= column {
                    cells.resize(column + 1, Cell::Empty);
                }
                cells[column] = value;
                Ok(())
            })
        })
    }

    fn delete_row(&self, table: Table, row: usize) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.enter(table, StoreOp::DeleteRow).await?;
            self.with_table(table, |t| {
                if row >= t.rows.len() {
                    return Err(StoreError::OutOfRange { table, row, column: None });
                }
                t.rows.remove(row);
                Ok(())
            })
        })
    }

    fn location(&self) -> String {
        "memory://kasir".to_string()
    }
}
