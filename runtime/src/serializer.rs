//! Process-wide request serialization.
//!
//! The tabular store has no multi-row transactions, so every mutating request
//! runs inside one global critical section. [`RequestSerializer`] is that
//! section: a single async mutex with a bounded acquisition wait.
//!
//! # Guarantees
//!
//! - At most one critical section runs at a time; the total order of mutating
//!   requests is the order of lock acquisition.
//! - If the lock is not acquired within the wait bound the request fails with
//!   [`PosError::LockTimeout`] and its pipeline never runs.
//! - The lock is released on every exit path: normal return, error return, a
//!   panic inside the section, or the caller dropping the future.
//!
//! Once acquired, nothing inside the section has its own timeout. A slow store
//! call holds the lock for as long as it takes.

use crate::metrics::SerializerMetrics;
use kasir_core::error::PosError;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Default bound on waiting for the request lock.
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(30);

/// Single global lock guarding all mutating requests.
#[derive(Debug)]
pub struct RequestSerializer {
    lock: Mutex<()>,
    wait: Duration,
}

impl RequestSerializer {
    /// Create a serializer that waits at most `wait` for the lock.
    #[must_use]
    pub fn new(wait: Duration) -> Self {
        Self {
            lock: Mutex::new(()),
            wait,
        }
    }

    /// Configured acquisition bound.
    #[must_use]
    pub const fn lock_wait(&self) -> Duration {
        self.wait
    }

    /// Whether a critical section is currently running.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.lock.try_lock().is_err()
    }

    /// Run `section` while holding the lock.
    ///
    /// `name` labels the section in logs.
    ///
    /// # Errors
    ///
    /// Returns [`PosError::LockTimeout`] if the lock was not acquired in time,
    /// otherwise whatever `section` returns.
    pub async fn run_exclusive<F, Fut, T>(
        &self,
        name: &'static str,
        section: F,
    ) -> Result<T, PosError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, PosError>>,
    {
        let started = Instant::now();

        let Ok(guard) = tokio::time::timeout(self.wait, self.lock.lock()).await else {
            SerializerMetrics::record_timeout();
            tracing::warn!(
                section = name,
                wait_ms = u64::try_from(self.wait.as_millis()).unwrap_or(u64::MAX),
                "Request lock not acquired in time"
            );
            return Err(PosError::LockTimeout(self.wait));
        };

        SerializerMetrics::record_wait(started.elapsed());
        tracing::debug!(section = name, "Entered critical section");

        let result = section().await;

        drop(guard);
        tracing::debug!(section = name, ok = result.is_ok(), "Left critical section");
        result
    }
}

impl Default for RequestSerializer {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_WAIT)
    }
}
