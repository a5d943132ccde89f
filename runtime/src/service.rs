//! The point-of-sale service: one entry point for every envelope action.
//!
//! Mutating actions run inside the [`RequestSerializer`]; read actions run
//! without it.

use crate::dispatch::{Action, RequestEnvelope, ResponseEnvelope};
use crate::metrics;
use crate::pipeline::{CommitPipeline, CommitReceipt};
use crate::reports::{self, DateRangeFilter};
use crate::serializer::{DEFAULT_LOCK_WAIT, RequestSerializer};
use crate::{bootstrap, cash_notes, catalog};
use kasir_core::environment::{Clock, IdGenerator, SystemClock, TimestampIdGenerator};
use kasir_core::error::PosError;
use kasir_core::tabular::{Table, TabularStore};
use kasir_core::types::TransactionRequest;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Default operator tag written on transactions.
pub const DEFAULT_OPERATOR_TAG: &str = "Kasir";

/// Runtime knobs of the service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PosConfig {
    /// Bound on waiting for the request lock
    pub lock_wait: Duration,
    /// Operator tag written on every transaction
    pub operator_tag: String,
}

impl Default for PosConfig {
    fn default() -> Self {
        Self {
            lock_wait: DEFAULT_LOCK_WAIT,
            operator_tag: DEFAULT_OPERATOR_TAG.to_string(),
        }
    }
}

/// Handles envelope requests against one store.
///
/// Cheap to clone; clones share the store and the request lock.
#[derive(Clone)]
pub struct PosService {
    store: Arc<dyn TabularStore>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    serializer: Arc<RequestSerializer>,
    pipeline: CommitPipeline,
}

impl PosService {
    /// Create a service with the system clock and timestamp IDs.
    #[must_use]
    pub fn new(store: Arc<dyn TabularStore>, config: PosConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ids: Arc<dyn IdGenerator> = Arc::new(TimestampIdGenerator::new(Arc::clone(&clock)));
        Self::with_environment(store, clock, ids, config)
    }

    /// Create a service with injected time and ID sources.
    #[must_use]
    pub fn with_environment(
        store: Arc<dyn TabularStore>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        config: PosConfig,
    ) -> Self {
        let pipeline = CommitPipeline::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            Arc::clone(&ids),
            config.operator_tag,
        );
        Self {
            store,
            clock,
            ids,
            serializer: Arc::new(RequestSerializer::new(config.lock_wait)),
            pipeline,
        }
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn TabularStore> {
        &self.store
    }

    /// The request serializer shared by all clones.
    #[must_use]
    pub fn serializer(&self) -> &RequestSerializer {
        &self.serializer
    }

    /// Create missing tables. Call once at startup.
    ///
    /// # Errors
    ///
    /// - `Store`: backend failure
    pub async fn bootstrap(&self) -> Result<Vec<Table>, PosError> {
        bootstrap::ensure_schema(self.store.as_ref()).await
    }

    /// Tables that do not exist yet.
    ///
    /// # Errors
    ///
    /// - `Store`: backend failure
    pub async fn missing_tables(&self) -> Result<Vec<Table>, PosError> {
        bootstrap::missing_tables(self.store.as_ref()).await
    }

    /// Handle one envelope. Never fails; errors become error responses.
    pub async fn handle(&self, envelope: RequestEnvelope) -> ResponseEnvelope {
        let requested = envelope.action.clone();
        let (label, result) = match Action::parse(envelope) {
            Ok(action) => (action.name(), self.execute(action).await),
            Err(error) => (metrics::INVALID_ACTION_LABEL, Err(error)),
        };

        if let Err(error) = &result {
            tracing::error!(
                action = %requested,
                kind = error.kind(),
                error = %error,
                "Request failed"
            );
        }
        let response = ResponseEnvelope::from_result(result);
        metrics::record_request(label, response.status());
        response
    }

    /// Run one parsed action.
    ///
    /// # Errors
    ///
    /// Whatever the action fails with. Mutating actions also fail with
    /// `LockTimeout` when the request lock is not acquired in time.
    pub async fn execute(&self, action: Action) -> Result<Value, PosError> {
        let name = action.name();
        if !action.is_mutating() {
            return self.read(action).await;
        }
        self.serializer
            .run_exclusive(name, || self.write(action))
            .await
    }

    /// Commit a sale under the request lock.
    ///
    /// # Errors
    ///
    /// `LockTimeout`, or the first failing commit step's error.
    pub async fn record_transaction(
        &self,
        request: TransactionRequest,
    ) -> Result<CommitReceipt, PosError> {
        self.serializer
            .run_exclusive("recordTransaction", || async move {
                self.pipeline.commit(request).await.map_err(PosError::from)
            })
            .await
    }

    async fn read(&self, action: Action) -> Result<Value, PosError> {
        let store = self.store.as_ref();
        match action {
            Action::GetInitialData => {
                Ok(serde_json::to_value(reports::initial_data(store).await?)?)
            },
            Action::GetSheetData(table) => {
                Ok(Value::from(reports::sheet_data(store, table).await?))
            },
            Action::GetFilteredData(query) => {
                let filter = DateRangeFilter::from_query(&query)?;
                Ok(Value::from(filter.apply(store).await?))
            },
            Action::GetSpreadsheetUrl => Ok(Value::from(store.location())),
            other => {
                Err(PosError::validation(format!("{} is not a read action", other.name())))
            },
        }
    }

    async fn write(&self, action: Action) -> Result<Value, PosError> {
        let store = self.store.as_ref();
        match action {
            Action::RecordTransaction(request) => {
                let receipt = self.pipeline.commit(request).await?;
                Ok(Value::from(receipt.transaction_id))
            },
            Action::RecordCashNote(request) => {
                let now = self.clock.now();
                let note =
                    cash_notes::record_cash_note(store, self.ids.as_ref(), request, now).await?;
                Ok(Value::from(cash_notes::confirmation(&note)))
            },
            Action::SaveItem { kind, input } => {
                catalog::save_item(store, self.ids.as_ref(), kind, input).await?;
                Ok(Value::from("Data saved."))
            },
            Action::DeleteItem { kind, id } => {
                catalog::delete_item(store, kind, &id).await?;
                Ok(Value::from("Item deleted."))
            },
            other => {
                Err(PosError::validation(format!("{} is not a write action", other.name())))
            },
        }
    }
}

impl std::fmt::Debug for PosService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PosService")
            .field("store", &self.store.location())
            .field("lock_wait", &self.serializer.lock_wait())
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::memory_store::MemoryTabularStore;
    use kasir_testing::fixtures::product_row;
    use kasir_testing::test_clock;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::json;

    fn service(store: &Arc<MemoryTabularStore>) -> PosService {
        let clock = Arc::new(test_clock());
        let ids = Arc::new(TimestampIdGenerator::new(clock.clone()));
        PosService::with_environment(store.clone(), clock, ids, PosConfig::default())
    }

    #[tokio::test]
    async fn record_transaction_returns_id() {
        let store = Arc::new(MemoryTabularStore::with_schema());
        store.seed(Table::Products, vec![product_row("P1", 10)]);

        let response = service(&store)
            .handle(RequestEnvelope::new(
                "recordTransaction",
                json!({
                    "customerName": "anonymous",
                    "items": [
                        {
                            "id": "P1",
                            "type": "product",
                            "name": "Soap",
                            "price": 1000,
                            "quantity": 2
                        }
                    ],
                    "subtotal": 2000,
                    "total": 2000
                }),
            ))
            .await;

        assert_eq!(
            response,
            ResponseEnvelope::Success { data: json!("INV-1735689600000") }
        );
    }

    #[tokio::test]
    async fn cash_note_confirmation() {
        let store = Arc::new(MemoryTabularStore::with_schema());

        let response = service(&store)
            .handle(RequestEnvelope::new(
                "recordCashNote",
                json!({"type": "in", "description": "Opening float", "amount": 50000}),
            ))
            .await;

        assert_eq!(response, ResponseEnvelope::Success { data: json!("in note saved.") });
    }

    #[tokio::test]
    async fn unknown_action_is_error_response() {
        let store = Arc::new(MemoryTabularStore::with_schema());

        let response = service(&store).handle(RequestEnvelope::new("explode", json!({}))).await;

        assert_eq!(
            response,
            ResponseEnvelope::Error {
                error: "Validation failed: invalid action: explode".to_string()
            }
        );
    }

    #[test]
    fn unknown_actions_share_one_metric_label() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let store = Arc::new(MemoryTabularStore::with_schema());
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        ::metrics::with_local_recorder(&recorder, || {
            runtime.block_on(async {
                let service = service(&store);
                for action in ["launchRocket", "dropAllTables", "getSpreadsheetUrl"] {
                    service.handle(RequestEnvelope::new(action, json!({}))).await;
                }
            });
        });

        let rendered = handle.render();
        assert!(rendered.contains(r#"kasir_requests_total{action="invalid",status="error"} 2"#));
        assert!(rendered.contains(r#"action="getSpreadsheetUrl",status="success""#));
        assert!(!rendered.contains("launchRocket"));
        assert!(!rendered.contains("dropAllTables"));
    }

    #[tokio::test]
    async fn lock_timeout_skips_the_write() {
        let store = Arc::new(MemoryTabularStore::with_schema());
        let clock = Arc::new(test_clock());
        let ids = Arc::new(TimestampIdGenerator::new(clock.clone()));
        let service = PosService::with_environment(
            store.clone(),
            clock,
            ids,
            PosConfig {
                lock_wait: Duration::from_millis(20),
                ..PosConfig::default()
            },
        );

        let (entered_tx, entered_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let holder = {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .serializer()
                    .run_exclusive("holder", || async move {
                        let _ = entered_tx.send(());
                        let _ = release_rx.await;
                        Ok::<_, PosError>(())
                    })
                    .await
            })
        };
        entered_rx.await.unwrap();

        let response = service
            .handle(RequestEnvelope::new(
                "recordCashNote",
                json!({"type": "out", "description": "Ice", "amount": 8000}),
            ))
            .await;

        assert!(!response.is_success());
        assert!(store.rows(Table::CashNotes).is_empty());

        release_tx.send(()).unwrap();
        holder.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn reads_skip_the_lock() {
        let store = Arc::new(MemoryTabularStore::with_schema());
        let service = service(&store);
        let (entered_tx, entered_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let holder = {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .serializer()
                    .run_exclusive("holder", || async move {
                        let _ = entered_tx.send(());
                        let _ = release_rx.await;
                        Ok::<_, PosError>(())
                    })
                    .await
            })
        };
        entered_rx.await.unwrap();

        let response = service
            .handle(RequestEnvelope::new("getSheetData", json!({"sheetName": "products"})))
            .await;
        assert_eq!(response, ResponseEnvelope::Success { data: json!([]) });

        release_tx.send(()).unwrap();
        holder.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn spreadsheet_url_is_store_location() {
        let store = Arc::new(MemoryTabularStore::with_schema());

        let response = service(&store)
            .handle(RequestEnvelope::new("getSpreadsheetUrl", Value::Null))
            .await;

        assert_eq!(response, ResponseEnvelope::Success { data: json!(store.location()) });
    }
}
