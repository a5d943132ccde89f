//! The transaction commit pipeline.
//!
//! Given a cart, a commit runs four steps in a fixed order:
//!
//! 1. [`materializer`]: mint catalog rows for custom items and rewrite the cart
//! 2. [`ledger`]: append the transaction record
//! 3. [`inventory`]: decrement tracked stock in one bulk write
//! 4. [`customer`]: upsert the customer aggregate
//!
//! The pipeline itself takes no lock. Callers run it inside
//! [`RequestSerializer::run_exclusive`](crate::serializer::RequestSerializer::run_exclusive)
//! so that no two commits interleave.
//!
//! # Partial commits
//!
//! A failing step aborts the rest, and nothing already written is undone. A
//! failure in step 4, for example, leaves a recorded sale with no customer
//! update. The caller sees only the error; the completed steps are logged as a
//! [`CommitProgress`].

pub mod customer;
pub mod inventory;
pub mod ledger;
pub mod materializer;

pub use customer::CustomerOutcome;
pub use inventory::{StockAdjustment, StockChange};
pub use materializer::MaterializedItem;

use crate::metrics::CommitMetrics;
use kasir_core::environment::{Clock, IdGenerator};
use kasir_core::error::PosError;
use kasir_core::tabular::TabularStore;
use kasir_core::types::TransactionRequest;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// One step of a commit, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitStep {
    /// Custom items minted into the catalog
    Materialize,
    /// Transaction row appended
    AppendLedger,
    /// Stock decremented
    AdjustInventory,
    /// Customer aggregate upserted
    UpsertCustomer,
}

impl CommitStep {
    /// Every step, in execution order.
    pub const ORDER: [Self; 4] = [
        Self::Materialize,
        Self::AppendLedger,
        Self::AdjustInventory,
        Self::UpsertCustomer,
    ];

    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Materialize => "materialize",
            Self::AppendLedger => "append_ledger",
            Self::AdjustInventory => "adjust_inventory",
            Self::UpsertCustomer => "upsert_customer",
        }
    }
}

impl fmt::Display for CommitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Steps a commit has finished so far.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CommitProgress {
    completed: Vec<CommitStep>,
    transaction_id: Option<String>,
}

impl CommitProgress {
    /// Steps finished, in order.
    #[must_use]
    pub fn completed(&self) -> &[CommitStep] {
        &self.completed
    }

    /// Transaction ID, once the ledger step has run.
    #[must_use]
    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }

    /// Whether any step has written to the store.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.completed.is_empty()
    }

    /// The step that runs next, if any.
    #[must_use]
    pub fn next_step(&self) -> Option<CommitStep> {
        CommitStep::ORDER.get(self.completed.len()).copied()
    }

    fn complete(&mut self, step: CommitStep) {
        self.completed.push(step);
    }
}

/// Result of a successful commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitReceipt {
    /// New transaction ID
    pub transaction_id: String,
    /// Custom items minted into the catalog
    pub materialized: Vec<MaterializedItem>,
    /// Stock changes applied
    pub stock: StockAdjustment,
    /// What happened to the customer aggregate
    pub customer: CustomerOutcome,
}

/// Error from a commit, with the steps that completed before it.
#[derive(Clone, Debug, PartialEq)]
pub struct CommitFailure {
    /// The first error encountered
    pub error: PosError,
    /// The step that failed
    pub step: CommitStep,
    /// Steps that completed and were not undone
    pub progress: CommitProgress,
}

impl From<CommitFailure> for PosError {
    fn from(failure: CommitFailure) -> Self {
        failure.error
    }
}

/// Runs the four commit steps against one store.
#[derive(Clone)]
pub struct CommitPipeline {
    store: Arc<dyn TabularStore>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    operator_tag: String,
}

impl CommitPipeline {
    /// Create a pipeline.
    #[must_use]
    pub fn new(
        store: Arc<dyn TabularStore>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        operator_tag: impl Into<String>,
    ) -> Self {
        Self {
            store,
            clock,
            ids,
            operator_tag: operator_tag.into(),
        }
    }

    /// Operator tag written on every transaction.
    #[must_use]
    pub fn operator_tag(&self) -> &str {
        &self.operator_tag
    }

    /// Commit a sale.
    ///
    /// Must run inside the request serializer's critical section.
    ///
    /// # Errors
    ///
    /// Returns the first step error as a [`CommitFailure`]. Steps completed
    /// before it stay applied.
    pub async fn commit(
        &self,
        request: TransactionRequest,
    ) -> Result<CommitReceipt, CommitFailure> {
        let started = Instant::now();
        let mut progress = CommitProgress::default();

        let result = self.run_steps(request, &mut progress).await;

        match result {
            Ok(receipt) => {
                CommitMetrics::record_commit(
                    started.elapsed(),
                    receipt.materialized.len(),
                    receipt.stock.changes.len(),
                );
                tracing::info!(
                    transaction_id = %receipt.transaction_id,
                    materialized = receipt.materialized.len(),
                    decrements = receipt.stock.changes.len(),
                    customer = ?receipt.customer,
                    "Transaction committed"
                );
                Ok(receipt)
            },
            Err(error) => {
                let step = progress.next_step().unwrap_or(CommitStep::UpsertCustomer);
                CommitMetrics::record_failure(step.as_str());
                if progress.is_partial() {
                    tracing::warn!(
                        failed_step = %step,
                        completed = ?progress.completed(),
                        transaction_id = ?progress.transaction_id(),
                        error = %error,
                        "Commit aborted after partial writes; completed steps were not undone"
                    );
                } else {
                    tracing::warn!(failed_step = %step, error = %error, "Commit aborted");
                }
                Err(CommitFailure { error, step, progress })
            },
        }
    }

    async fn run_steps(
        &self,
        request: TransactionRequest,
        progress: &mut CommitProgress,
    ) -> Result<CommitReceipt, PosError> {
        let store = self.store.as_ref();
        let now = self.clock.now();

        let mut items = request.items.clone();
        let materialized =
            materializer::materialize_custom_items(store, self.ids.as_ref(), &mut items).await?;
        progress.complete(CommitStep::Materialize);

        let record = ledger::append_transaction(
            store,
            self.ids.as_ref(),
            &request,
            items,
            &self.operator_tag,
            now,
        )
        .await?;
        progress.transaction_id = Some(record.id.clone());
        progress.complete(CommitStep::AppendLedger);

        let stock = inventory::adjust_stock(store, &record.items).await?;
        progress.complete(CommitStep::AdjustInventory);

        let customer = customer::upsert_customer(store, &request, &record.id, now).await?;
        progress.complete(CommitStep::UpsertCustomer);

        Ok(CommitReceipt {
            transaction_id: record.id,
            materialized,
            stock,
            customer,
        })
    }
}

impl fmt::Debug for CommitPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommitPipeline")
            .field("store", &self.store.location())
            .field("operator_tag", &self.operator_tag)
            .finish_non_exhaustive()
    }
}
