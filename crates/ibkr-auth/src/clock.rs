//! Injectable time source
//!
//! OAuth timestamps and token expiry checks read the clock through [`Clock`]
//! so negotiation and signing stay deterministic under test.

use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current unix time in seconds
pub trait Clock: Send + Sync {
    /// Current time, unix seconds
    fn now_unix_secs(&self) -> i64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix_secs(&self) -> i64 {
        // A clock set before 1970 reads as negative seconds
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_secs() as i64,
            Err(before) => -(before.duration().as_secs() as i64),
        }
    }
}

/// Manually driven clock for tests
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct ManualClock {
    now: std::sync::atomic::AtomicI64,
}

#[cfg(any(test, feature = "test-utils"))]
impl ManualClock {
    /// Create a clock frozen at `now`
    pub fn new(now: i64) -> Self {
        Self {
            now: std::sync::atomic::AtomicI64::new(now),
        }
    }

    /// Jump to an absolute time
    pub fn set(&self, now: i64) {
        self.now.store(now, std::sync::atomic::Ordering::SeqCst);
    }

    /// Move forward by `secs`
    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Clock for ManualClock {
    fn now_unix_secs(&self) -> i64 {
        self.now.load(std::sync::atomic::Ordering::SeqCst)
    }
}
