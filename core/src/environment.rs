//! Injected dependencies: time and identifier generation.
//!
//! Both are traits so tests can pin time and IDs down deterministically.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Clock trait - abstracts time operations for testability
///
/// # Examples
///
/// ```ignore
/// // Production - uses system clock
/// let clock = SystemClock;
///
/// // Test - fixed time for deterministic tests
/// let clock = FixedClock::new(time);
/// ```
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Source of record identifiers.
pub trait IdGenerator: Send + Sync {
    /// Next identifier with the given prefix.
    fn next_id(&self, prefix: &str) -> String;
}

/// Identifiers of the form `<prefix><unix millis>`.
///
/// Values are strictly increasing within one generator: when the clock has not
/// moved past the last issued value, the generator issues `last + 1` instead.
/// Nothing coordinates separate processes, so two writers sharing one store
/// can still mint the same ID.
pub struct TimestampIdGenerator {
    clock: Arc<dyn Clock>,
    last: AtomicI64,
}

impl TimestampIdGenerator {
    /// Create a generator driven by `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            last: AtomicI64::new(i64::MIN),
        }
    }

    fn next_millis(&self) -> i64 {
        let now = self.clock.now().timestamp_millis();
        let mut last = self.last.load(Ordering::Acquire);
        loop {
            let candidate = if now > last { now } else { last + 1 };
            match self
                .last
                .compare_exchange_weak(last, candidate, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }
}

impl IdGenerator for TimestampIdGenerator {
    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.next_millis())
    }
}

impl std::fmt::Debug for TimestampIdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimestampIdGenerator")
            .field("last", &self.last.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
