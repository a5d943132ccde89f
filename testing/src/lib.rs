//! # Kasir Testing
//!
//! Testing utilities for the Kasir point-of-sale backend.
//!
//! This crate provides:
//! - [`MemoryTabularStore`]: re-export of the runtime's in-memory store
//! - [`FixedClock`] and [`test_clock`]: deterministic time
//! - [`fixtures`]: row and cart builders
//! - [`CommitScenario`]: a Given-When-Then harness for the commit pipeline
//! - [`properties`]: proptest strategies for carts and totals
//!
//! ## Example
//!
//! ```ignore
//! use kasir_testing::{CommitScenario, fixtures::*};
//!
//! #[tokio::test]
//! async fn sale_decrements_stock() {
//!     CommitScenario::new()
//!         .given_rows(Table::Products, vec![product_row("P1", 10)])
//!         .when_committed(transaction_request("", None, 24_000, vec![product_line("P1", 2)]))
//!         .then_store(|store| {
//!             assert_eq!(store.rows(Table::Products)[0][product_col::STOCK], Cell::Integer(8));
//!         })
//!         .run()
//!         .await;
//! }
//! ```

use chrono::{DateTime, Utc};
use kasir_core::environment::Clock;

pub mod fixtures;
pub mod scenario;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use kasir_testing::mocks::FixedClock;
    /// use kasir_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::from_timestamp_millis(1_735_689_600_000).unwrap_or_default())
    }
}

/// Property-based testing strategies.
pub mod properties {
    use proptest::prelude::*;

    /// Starting stock of a finite-stock product.
    pub fn stock_level() -> impl Strategy<Value = i64> {
        0_i64..1_000
    }

    /// Units sold on one cart line.
    pub fn quantity() -> impl Strategy<Value = i64> {
        1_i64..20
    }

    /// Transaction totals for a run of visits by one customer.
    pub fn visit_totals() -> impl Strategy<Value = Vec<i64>> {
        prop::collection::vec(0_i64..1_000_000, 1..12)
    }
}

/// Install a test subscriber that honours `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use kasir_runtime::memory_store::{MemoryTabularStore, StoreOp};
pub use mocks::{FixedClock, test_clock};
pub use scenario::CommitScenario;
