//! Fluent Given-When-Then harness for commit pipeline tests.

#![allow(clippy::module_name_repetitions)]

use kasir_runtime::memory_store::{MemoryTabularStore, StoreOp};
use crate::mocks::test_clock;
use kasir_core::Row;
use kasir_core::environment::TimestampIdGenerator;
use kasir_core::tabular::Table;
use kasir_core::types::TransactionRequest;
use kasir_runtime::pipeline::{CommitFailure, CommitPipeline, CommitReceipt};
use std::sync::Arc;

type ReceiptAssertion = Box<dyn FnOnce(&CommitReceipt)>;
type FailureAssertion = Box<dyn FnOnce(&CommitFailure)>;
type StoreAssertion = Box<dyn FnOnce(&MemoryTabularStore)>;

/// Fluent API for testing one commit against an in-memory store.
///
/// The store starts with every table present and empty. Time is fixed at the
/// [`test_clock`] instant.
///
/// # Example
///
/// ```ignore
/// use kasir_testing::CommitScenario;
///
/// CommitScenario::new()
///     .given_rows(Table::Products, vec![product_row("P1", 10)])
///     .when_committed(transaction_request("Budi", None, 24_000, vec![product_line("P1", 2)]))
///     .then_receipt(|receipt| assert_eq!(receipt.stock.changes.len(), 1))
///     .then_store(|store| assert_eq!(store.rows(Table::Transactions).len(), 1))
///     .run()
///     .await;
/// ```
pub struct CommitScenario {
    store: Arc<MemoryTabularStore>,
    request: Option<TransactionRequest>,
    receipt_assertions: Vec<ReceiptAssertion>,
    failure_assertions: Vec<FailureAssertion>,
    store_assertions: Vec<StoreAssertion>,
}

impl CommitScenario {
    /// Create a scenario over an empty, fully bootstrapped store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryTabularStore::with_schema()),
            request: None,
            receipt_assertions: Vec::new(),
            failure_assertions: Vec::new(),
            store_assertions: Vec::new(),
        }
    }

    /// Seed rows into a table (Given)
    #[must_use]
    pub fn given_rows(self, table: Table, rows: Vec<Row>) -> Self {
        self.store.seed(table, rows);
        self
    }

    /// Remove a table before the commit (Given)
    #[must_use]
    pub fn given_missing(self, table: Table) -> Self {
        self.store.drop_table(table);
        self
    }

    /// Make an operation on a table fail (Given)
    #[must_use]
    pub fn given_failure(self, table: Table, op: StoreOp) -> Self {
        self.store.fail_on(table, op);
        self
    }

    /// Set the cart to commit (When)
    #[must_use]
    pub fn when_committed(mut self, request: TransactionRequest) -> Self {
        self.request = Some(request);
        self
    }

    /// Expect success and inspect the receipt (Then)
    #[must_use]
    pub fn then_receipt<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&CommitReceipt) + 'static,
    {
        self.receipt_assertions.push(Box::new(assertion));
        self
    }

    /// Expect failure and inspect it (Then)
    #[must_use]
    pub fn then_failure<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&CommitFailure) + 'static,
    {
        self.failure_assertions.push(Box::new(assertion));
        self
    }

    /// Inspect the store after the commit (Then)
    #[must_use]
    pub fn then_store<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&MemoryTabularStore) + 'static,
    {
        self.store_assertions.push(Box::new(assertion));
        self
    }

    /// Run the commit and every assertion.
    ///
    /// # Panics
    ///
    /// Panics if no cart was set, if the outcome does not match the kind of
    /// assertions registered, or if any assertion fails.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub async fn run(self) {
        let request = self.request.expect("Cart must be set with when_committed()");
        let clock = Arc::new(test_clock());
        let ids = Arc::new(TimestampIdGenerator::new(clock.clone()));
        let pipeline = CommitPipeline::new(self.store.clone(), clock, ids, "Kasir");

        match pipeline.commit(request).await {
            Ok(receipt) => {
                assert!(
                    self.failure_assertions.is_empty(),
                    "expected the commit to fail, got {receipt:?}"
                );
                for assertion in self.receipt_assertions {
                    assertion(&receipt);
                }
            },
            Err(failure) => {
                assert!(
                    self.receipt_assertions.is_empty(),
                    "expected the commit to succeed, got {failure:?}"
                );
                for assertion in self.failure_assertions {
                    assertion(&failure);
                }
            },
        }

        for assertion in self.store_assertions {
            assertion(&self.store);
        }
    }
}

impl Default for CommitScenario {
    fn default() -> Self {
        Self::new()
    }
}
