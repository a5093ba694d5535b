//! Cancellable one-shot timer for the playback start action.
//!
//! `arm` schedules an action after a delay on the tokio runtime; `cancel`
//! aborts it if it has not fired yet. Cancelling an unarmed or already-fired
//! timer is a no-op, and re-arming replaces any pending shot.

use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub struct OneShotTimer {
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl OneShotTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer to run `action` after `delay`. A zero delay fires the
    /// action on the next scheduler tick. Replaces any pending shot.
    pub fn arm<F>(&self, delay: Duration, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            action();
        });

        let mut pending = self.pending.lock().expect("timer lock poisoned");
        if let Some(previous) = pending.replace(handle) {
            previous.abort();
        }
    }

    /// Abort the pending shot if any. Idempotent.
    pub fn cancel(&self) {
        if let Some(handle) = self.pending.lock().expect("timer lock poisoned").take() {
            handle.abort();
        }
    }
}

impl Drop for OneShotTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_fires_after_delay() {
        let fired = Arc::new(AtomicUsize::new(0));
        let timer = OneShotTimer::new();

        let counter = Arc::clone(&fired);
        timer.arm(Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_prevents_fire() {
        let fired = Arc::new(AtomicUsize::new(0));
        let timer = OneShotTimer::new();

        let counter = Arc::clone(&fired);
        timer.arm(Duration::from_millis(60), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        timer.cancel();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_idempotent_and_safe_after_fire() {
        let fired = Arc::new(AtomicUsize::new(0));
        let timer = OneShotTimer::new();

        // Never armed: no-op.
        timer.cancel();

        let counter = Arc::clone(&fired);
        timer.arm(Duration::ZERO, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Already fired: no-op, twice.
        timer.cancel();
        timer.cancel();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rearm_replaces_pending() {
        let fired = Arc::new(AtomicUsize::new(0));
        let timer = OneShotTimer::new();

        let first = Arc::clone(&fired);
        timer.arm(Duration::from_millis(60), move || {
            first.fetch_add(100, Ordering::SeqCst);
        });
        let second = Arc::clone(&fired);
        timer.arm(Duration::from_millis(10), move || {
            second.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
