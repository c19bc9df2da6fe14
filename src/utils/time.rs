use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};

/// One hour in milliseconds.
pub const HOUR_MILLIS: i64 = 60 * 60 * 1000;

pub fn time_millis() -> i64 {
    let time: DateTime<chrono::Utc> = Utc::now();
    time.timestamp_millis()
}

/// Source of wall-clock time for deadlines.
pub trait Clock: Send + Sync {
    /// Current time as milliseconds since the unix epoch.
    fn now_millis(&self) -> i64;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        time_millis()
    }
}

/// Clock that only moves when told to.
///
/// Useful to drive wait deadlines deterministically.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
        }
    }

    pub fn set(
        &self,
        millis: i64,
    ) {
        self.now.store(millis, Ordering::SeqCst);
    }

    pub fn advance_millis(
        &self,
        millis: i64,
    ) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn advance_hours(
        &self,
        hours: i64,
    ) {
        self.advance_millis(hours * HOUR_MILLIS);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        clock.advance_hours(2);
        assert_eq!(clock.now_millis(), 1_000 + 2 * HOUR_MILLIS);
        clock.set(5);
        assert_eq!(clock.now_millis(), 5);
    }
}
