//! Injectable wall clock.
//!
//! The store reads "now" through `Clock` so lifecycle rules (weekly reset,
//! monthly pruning, timestamps) can be replayed deterministically.

use chrono::{DateTime, Duration, Local, TimeZone};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Source of the current local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;

    /// Current time as Unix epoch milliseconds.
    fn now_ms(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Manually driven clock. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct FixedClock {
    millis: Arc<AtomicI64>,
}

impl FixedClock {
    pub fn at(instant: DateTime<Local>) -> Self {
        Self::at_millis(instant.timestamp_millis())
    }

    pub fn at_millis(millis: i64) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(millis)),
        }
    }

    pub fn set(&self, instant: DateTime<Local>) {
        self.millis
            .store(instant.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.millis
            .fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        let millis = self.millis.load(Ordering::SeqCst);
        Local
            .timestamp_millis_opt(millis)
            .single()
            .unwrap_or_else(Local::now)
    }

    fn now_ms(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}
