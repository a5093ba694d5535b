//! Wall-clock time source behind a trait seam.
//!
//! The wire protocol exchanges absolute epoch-millisecond timestamps, so the
//! services need real wall-clock time rather than a monotonic instant. The
//! trait keeps the services testable with a scripted clock.

use std::time::{SystemTime, UNIX_EPOCH};

/// Trait representing the host wall clock used for protocol timestamps.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;

    /// Seconds since the Unix epoch.
    fn now_seconds(&self) -> f64 {
        self.now_ms() as f64 / 1000.0
    }
}

/// Default clock backed by `SystemTime`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}
