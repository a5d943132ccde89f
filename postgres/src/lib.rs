//! `PostgreSQL` tabular store for Kasir.
//!
//! [`PostgresTabularStore`] implements the `TabularStore` trait from
//! `kasir-core` on two tables:
//!
//! - `kasir_tables`: one row per logical table, holding its header row
//! - `kasir_rows`: data rows, keyed by `(table_name, position)`, cells stored
//!   as `JSONB` in the cell's tagged encoding
//!
//! Positions are dense and 0-based, so they are the data-row indices the
//! trait speaks in. Every mutating call runs in its own database transaction
//! and locks the table's `kasir_tables` row first, which makes single calls
//! atomic with respect to each other. Nothing spans two calls.
//!
//! # Example
//!
//! ```ignore
//! use kasir_postgres::PostgresTabularStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresTabularStore::connect("postgres://localhost/kasir", 10).await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use kasir_core::cell::{Cell, Row};
use kasir_core::tabular::{StoreError, StoreFuture, Table, TabularStore};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Postgres, Transaction};
use thiserror::Error;

/// Errors raised while connecting or migrating, before the store is usable.
#[derive(Error, Debug)]
pub enum SetupError {
    /// The pool could not connect
    #[error("Failed to connect: {0}")]
    Connect(#[source] sqlx::Error),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Tabular store persisted in `PostgreSQL`.
#[derive(Clone)]
pub struct PostgresTabularStore {
    pool: PgPool,
    location: String,
}

impl PostgresTabularStore {
    /// Connect a new pool.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::Connect`] if the database is unreachable.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, SetupError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(SetupError::Connect)?;

        Ok(Self::from_pool(pool))
    }

    /// Use an existing connection pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        let options = pool.connect_options();
        let location = format!(
            "postgres://{}@{}:{}/{}",
            options.get_username(),
            options.get_host(),
            options.get_port(),
            options.get_database().unwrap_or_default()
        );
        Self { pool, location }
    }

    /// Create `kasir_tables` and `kasir_rows` if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::Migrate`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), SetupError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn require_table(&self, table: Table) -> Result<(), StoreError> {
        if self.table_exists(table).await? {
            Ok(())
        } else {
            Err(StoreError::TableMissing(table))
        }
    }

    async fn table_exists(&self, table: Table) -> Result<bool, StoreError> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM kasir_tables WHERE name = $1)")
                .bind(table.name())
                .fetch_one(&self.pool)
                .await
                .map_err(backend)?;
        Ok(exists)
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, StoreError> {
        self.pool.begin().await.map_err(backend)
    }
}

impl std::fmt::Debug for PostgresTabularStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresTabularStore")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

fn backend(error: sqlx::Error) -> StoreError {
    StoreError::Backend(error.to_string())
}

fn position(table: Table, row: usize) -> Result<i64, StoreError> {
    i64::try_from(row).map_err(|_| StoreError::OutOfRange {
        table,
        row,
        column: None,
    })
}

fn index(position: i64) -> Result<usize, StoreError> {
    usize::try_from(position).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Count a failed store call and pass the result through.
fn observe<T>(
    op: &'static str,
    table: Table,
    result: Result<T, StoreError>,
) -> Result<T, StoreError> {
    if let Err(error) = &result {
        tracing::warn!(op, table = %table, error = %error, "Store call failed");
        metrics::counter!("kasir_store_errors_total", "op" => op).increment(1);
    }
    result
}

/// Lock the table's catalog row for the rest of the transaction and return
/// its header row.
async fn lock_table(
    tx: &mut Transaction<'static, Postgres>,
    table: Table,
) -> Result<Vec<String>, StoreError> {
    let headers: Option<(Json<Vec<String>>,)> =
        sqlx::query_as("SELECT headers FROM kasir_tables WHERE name = $1 FOR UPDATE")
            .bind(table.name())
            .fetch_optional(&mut **tx)
            .await
            .map_err(backend)?;

    headers
        .map(|(Json(headers),)| headers)
        .ok_or(StoreError::TableMissing(table))
}

async fn row_count(
    tx: &mut Transaction<'static, Postgres>,
    table: Table,
) -> Result<usize, StoreError> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM kasir_rows WHERE table_name = $1")
        .bind(table.name())
        .fetch_one(&mut **tx)
        .await
        .map_err(backend)?;
    index(count)
}

impl TabularStore for PostgresTabularStore {
    fn ensure_table(
        &self,
        table: Table,
        headers: &'static [&'static str],
    ) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let result = sqlx::query(
                "INSERT INTO kasir_tables (name, headers) VALUES ($1, $2) \
                 ON CONFLICT (name) DO NOTHING",
            )
            .bind(table.name())
            .bind(Json(headers))
            .execute(&self.pool)
            .await
            .map_err(backend);

            observe("ensure_table", table, result.map(|done| done.rows_affected() == 1))
        })
    }

    fn has_table(&self, table: Table) -> StoreFuture<'_, bool> {
        Box::pin(async move { observe("has_table", table, self.table_exists(table).await) })
    }

    fn read_rows(&self, table: Table) -> StoreFuture<'_, Vec<Row>> {
        Box::pin(async move {
            let result = async {
                self.require_table(table).await?;
                let rows: Vec<(Json<Row>,)> = sqlx::query_as(
                    "SELECT cells FROM kasir_rows WHERE table_name = $1 ORDER BY position",
                )
                .bind(table.name())
                .fetch_all(&self.pool)
                .await
                .map_err(backend)?;
                Ok::<_, StoreError>(rows.into_iter().map(|(Json(cells),)| cells).collect())
            }
            .await;

            observe("read_rows", table, result)
        })
    }

    fn write_rows(&self, table: Table, start: usize, rows: Vec<Row>) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let result = async {
                let mut tx = self.begin().await?;
                lock_table(&mut tx, table).await?;

                let end = start + rows.len();
                if end > row_count(&mut tx, table).await? {
                    return Err(StoreError::OutOfRange {
                        table,
                        row: end.saturating_sub(1).max(start),
                        column: None,
                    });
                }

                for (offset, cells) in rows.iter().enumerate() {
                    sqlx::query(
                        "UPDATE kasir_rows SET cells = $3, updated_at = now() \
                         WHERE table_name = $1 AND position = $2",
                    )
                    .bind(table.name())
                    .bind(position(table, start + offset)?)
                    .bind(Json(cells))
                    .execute(&mut *tx)
                    .await
                    .map_err(backend)?;
                }

                tx.commit().await.map_err(backend)
            }
            .await;

            observe("write_rows", table, result)
        })
    }

    fn append_row(&self, table: Table, row: Row) -> StoreFuture<'_, usize> {
        Box::pin(async move {
            let result = async {
                let mut tx = self.begin().await?;
                lock_table(&mut tx, table).await?;

                let (next,): (i64,) = sqlx::query_as(
                    "SELECT COALESCE(MAX(position) + 1, 0) FROM kasir_rows WHERE table_name = $1",
                )
                .bind(table.name())
                .fetch_one(&mut *tx)
                .await
                .map_err(backend)?;

                sqlx::query(
                    "INSERT INTO kasir_rows (table_name, position, cells) VALUES ($1, $2, $3)",
                )
                .bind(table.name())
                .bind(next)
                .bind(Json(&row))
                .execute(&mut *tx)
                .await
                .map_err(backend)?;

                tx.commit().await.map_err(backend)?;
                index(next)
            }
            .await;

            observe("append_row", table, result)
        })
    }

    fn get_cell(&self, table: Table, row: usize, column: usize) -> StoreFuture<'_, Cell> {
        Box::pin(async move {
            let result = async {
                self.require_table(table).await?;
                let cells: Option<(Json<Row>,)> = sqlx::query_as(
                    "SELECT cells FROM kasir_rows WHERE table_name = $1 AND position = $2",
                )
                .bind(table.name())
                .bind(position(table, row)?)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;

                let (Json(cells),) = cells.ok_or(StoreError::OutOfRange {
                    table,
                    row,
                    column: Some(column),
                })?;
                Ok::<_, StoreError>(cells.get(column).cloned().unwrap_or_default())
            }
            .await;

            observe("get_cell", table, result)
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
            let result = async {
                let mut tx = self.begin().await?;
                let width = lock_table(&mut tx, table).await?.len();
                let out_of_range = StoreError::OutOfRange {
                    table,
                    row,
                    column: Some(column),
                };
                if column >= width {
                    return Err(out_of_range);
                }

                let at = position(table, row)?;
                let cells: Option<(Json<Row>,)> = sqlx::query_as(
                    "SELECT cells FROM kasir_rows WHERE table_name = $1 AND position = $2",
                )
                .bind(table.name())
                .bind(at)
                .fetch_optional(&mut *tx)
                .await
                .map_err(backend)?;

                let (Json(mut cells),) = cells.ok_or(out_of_range)?;
                if cells.len() <= column {
                    cells.resize(column + 1, Cell::Empty);
                }
                cells[column] = value;

                sqlx::query(
                    "UPDATE kasir_rows SET cells = $3, updated_at = now() \
                     WHERE table_name = $1 AND position = $2",
                )
                .bind(table.name())
                .bind(at)
                .bind(Json(&cells))
                .execute(&mut *tx)
                .await
                .map_err(backend)?;

                tx.commit().await.map_err(backend)
            }
            .await;

            observe("set_cell", table, result)
        })
    }

    fn delete_row(&self, table: Table, row: usize) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let result = async {
                let mut tx = self.begin().await?;
                lock_table(&mut tx, table).await?;

                let at = position(table, row)?;
                let deleted =
                    sqlx::query("DELETE FROM kasir_rows WHERE table_name = $1 AND position = $2")
                        .bind(table.name())
                        .bind(at)
                        .execute(&mut *tx)
                        .await
                        .map_err(backend)?;
                if deleted.rows_affected() == 0 {
                    return Err(StoreError::OutOfRange { table, row, column: None });
                }

                sqlx::query(
                    "UPDATE kasir_rows SET position = position - 1 \
                     WHERE table_name = $1 AND position > $2",
                )
                .bind(table.name())
                .bind(at)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;

                tx.commit().await.map_err(backend)
            }
            .await;

            observe("delete_row", table, result)
        })
    }

    fn location(&self) -> String {
        self.location.clone()
    }
}
