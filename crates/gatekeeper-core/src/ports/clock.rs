use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Time source abstraction.
///
/// Algorithms never read the wall clock directly; they are handed a clock at
/// construction so tests can drive time deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system wall clock.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Intended for tests.
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

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock();
        *now += chrono::Duration::from_std(delta).unwrap_or(chrono::Duration::zero());
    }

    /// Move the clock backward by `delta`. Used to simulate negative skew.
    pub fn rewind(&self, delta: Duration) {
        let mut now = self.now.lock();
        *now -= chrono::Duration::from_std(delta).unwrap_or(chrono::Duration::zero());
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock() = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
