//! Shared nanosecond clock for both capture streams
//!
//! Inertial ticks and camera frames are stamped from the same wall clock so
//! the two logs join on a common time base. Frame presentation times from the
//! capture device run on a different clock and are only converted for logging.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of Unix-epoch nanosecond timestamps
pub trait Clock: Send + Sync {
    fn now_ns(&self) -> i64;
}

/// Wall clock backed by `SystemTime`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ns(&self) -> i64 {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        duration_to_ns(since_epoch)
    }
}

/// Clock that only moves when told to.
///
/// Lets tests and replay hosts drive ticks at exact logical times.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ns: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ns),
        }
    }

    pub fn set(&self, ns: i64) {
        self.now.store(ns, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(duration_to_ns(by), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ns(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Convert a duration to whole nanoseconds, saturating at `i64::MAX`
pub fn duration_to_ns(d: Duration) -> i64 {
    i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)
}

/// Keeps one stream's timestamps strictly increasing.
///
/// If the wall clock repeats or steps backwards, the stamp is bumped to one
/// nanosecond past the previous one, so frame filenames never collide.
#[derive(Debug)]
pub struct TimestampGuard {
    last: AtomicI64,
}

impl Default for TimestampGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl TimestampGuard {
    pub fn new() -> Self {
        Self {
            last: AtomicI64::new(i64::MIN),
        }
    }

    /// Return `raw` or, if it does not advance the stream, `last + 1`
    pub fn stamp(&self, raw: i64) -> i64 {
        let mut next = raw;
        // fetch_update only fails if the closure returns None, which it never does
        let _ = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                next = if raw <= last { last.saturating_add(1) } else { raw };
                Some(next)
            });
        next
    }

    /// Last stamp handed out, if any
    pub fn last(&self) -> Option<i64> {
        match self.last.load(Ordering::Acquire) {
            i64::MIN => None,
            v => Some(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now_ns() > 1_577_836_800_000_000_000);
    }

    #[test]
    fn manual_clock_set_and_advance() {
        let clock = ManualClock::new(1000);
        assert_eq!(clock.now_ns(), 1000);
        clock.advance(Duration::from_millis(5));
        assert_eq!(clock.now_ns(), 5_001_000);
        clock.set(42);
        assert_eq!(clock.now_ns(), 42);
    }

    #[test]
    fn guard_passes_increasing_stamps_through() {
        let guard = TimestampGuard::new();
        assert_eq!(guard.last(), None);
        assert_eq!(guard.stamp(10), 10);
        assert_eq!(guard.stamp(20), 20);
        assert_eq!(guard.last(), Some(20));
    }

    #[test]
    fn guard_bumps_repeated_and_backwards_stamps() {
        let guard = TimestampGuard::new();
        assert_eq!(guard.stamp(100), 100);
        assert_eq!(guard.stamp(100), 101);
        assert_eq!(guard.stamp(50), 102);
        assert_eq!(guard.stamp(200), 200);
    }
}
