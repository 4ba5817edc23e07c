use std::sync::{Mutex, PoisonError};

use jiff::{SignedDuration, Timestamp, Zoned, tz::TimeZone};

/// Source of "now" for staleness decisions.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Zoned;
}

/// Wall clock in the time zone the nightly batch runs in.
#[derive(Debug, Clone)]
pub struct SystemClock {
    tz: TimeZone,
}

impl SystemClock {
    pub fn new(tz: TimeZone) -> Self {
        Self { tz }
    }

    /// Falls back to the system time zone when `name` is unknown.
    pub fn named(name: &str) -> Self {
        let tz = TimeZone::get(name).unwrap_or_else(|e| {
            tracing::warn!(time_zone = name, error = %e, "unknown time zone, using system zone");
            TimeZone::system()
        });
        Self { tz }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(TimeZone::system())
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Zoned {
        Timestamp::now().to_zoned(self.tz.clone())
    }
}

/// Settable clock for tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Zoned>,
}

impl ManualClock {
    pub fn new(now: Zoned) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: Zoned) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: SignedDuration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        if let Ok(next) = now.checked_add(by) {
            *now = next;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Zoned {
        self.now
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
