//! Keyed debounce scheduler.
//!
//! One place owns the debounce discipline: scheduling a key aborts any
//! timer already pending for that key, so a burst of triggers collapses
//! into a single execution after the quiet period.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;

#[derive(Debug, Default)]
pub struct DebounceScheduler {
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl DebounceScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `action` after `delay`, cancelling any pending timer for `key`.
    pub fn schedule<F, Fut>(&self, key: &str, delay: Duration, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            action().await;
        });
        let mut timers = self.timers.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = timers.insert(key.to_string(), handle) {
            previous.abort();
        }
    }

    /// Cancel a pending timer, if any.
    pub fn cancel(&self, key: &str) {
        let mut timers = self.timers.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = timers.remove(key) {
            handle.abort();
        }
    }
}

impl Drop for DebounceScheduler {
    fn drop(&mut self) {
        let timers = self.timers.lock().unwrap_or_else(|e| e.into_inner());
        for handle in timers.values() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::{advance, Duration};

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_to_one_execution() {
        let scheduler = DebounceScheduler::new();
        let fired = Arc::new(AtomicU32::new(0));

        for _ in 0..3 {
            let fired = Arc::clone(&fired);
            scheduler.schedule("refresh", Duration::from_secs(3), move || async move {
                fired.fetch_add(1, Ordering::SeqCst);
            });
            advance(Duration::from_millis(100)).await;
        }

        advance(Duration::from_secs(4)).await;
        tokio::task::yield_now().await;
        assert_eq!(1, fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_keys_run_independently() {
        let scheduler = DebounceScheduler::new();
        let fired = Arc::new(AtomicU32::new(0));

        for key in ["a", "b"] {
            let fired = Arc::clone(&fired);
            scheduler.schedule(key, Duration::from_secs(1), move || async move {
                fired.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::task::yield_now().await;
        advance(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(2, fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_execution() {
        let scheduler = DebounceScheduler::new();
        let fired = Arc::new(AtomicU32::new(0));

        {
            let fired = Arc::clone(&fired);
            scheduler.schedule("refresh", Duration::from_secs(1), move || async move {
                fired.fetch_add(1, Ordering::SeqCst);
            });
        }
        scheduler.cancel("refresh");

        advance(Duration::from_secs(2)).await;
        assert_eq!(0, fired.load(Ordering::SeqCst));
    }
}
