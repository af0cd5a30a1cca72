//! Injectable time source.
//!
//! # Responsibility
//! - Supply the current instant to verifiers, ledgers and export.
//! - Provide a deterministic test double that only moves when told to.
//!
//! # Invariants
//! - Core code never calls `Utc::now()` directly; it always asks a `Clock`.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};

/// Source of the current UTC instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Shared clock handle injected into every time-dependent component.
pub type SharedClock = Arc<dyn Clock>;

/// Wall-clock implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests and scenario replay.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Creates a clock positioned at `epoch_seconds` after the Unix epoch.
    ///
    /// Out-of-range inputs clamp to the Unix epoch.
    pub fn at_epoch_seconds(epoch_seconds: i64) -> Self {
        let start = DateTime::from_timestamp(epoch_seconds, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        Self::new(start)
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.lock();
        *guard += by;
    }

    pub fn advance_seconds(&self, seconds: i64) {
        self.advance(Duration::seconds(seconds));
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.lock() = instant;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        // A poisoned clock still holds a valid instant.
        self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, ManualClock, SharedClock};
    use std::sync::Arc;

    #[test]
    fn manual_clock_only_moves_when_advanced() {
        let clock = ManualClock::at_epoch_seconds(1_700_000_000);
        let start = clock.now();
        assert_eq!(clock.now(), start);

        clock.advance_seconds(299);
        assert_eq!((clock.now() - start).num_seconds(), 299);
    }

    #[test]
    fn shared_handle_observes_advances() {
        let manual = Arc::new(ManualClock::at_epoch_seconds(0));
        let shared: SharedClock = manual.clone();
        manual.advance_seconds(120);
        assert_eq!(shared.now().timestamp(), 120);
    }
}
