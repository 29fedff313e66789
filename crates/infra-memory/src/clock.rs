// Manual clock - a settable TimeProvider for deterministic runs

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use clinq_core::port::TimeProvider;

/// Clock that only moves when told to. Day-boundary behavior (numbering
/// resets, the day-close sweep) is untestable against wall time; this makes
/// it a one-line `advance`.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, delta: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += delta;
        }
    }
}

impl TimeProvider for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
