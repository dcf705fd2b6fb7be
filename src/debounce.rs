//! Trailing-edge debouncer
//!
//! Coalesces bursts of `trigger()` calls into one deferred invocation that
//! fires once the quiet window has passed since the last trigger.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

type Action = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Slot {
    /// Bumped on every trigger and cancel; a timer only fires if it still owns the current generation
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

/// Timer-based debouncer with deterministic cancel
///
/// Must be used from within a tokio runtime.
pub struct Debouncer {
    window: Duration,
    action: Action,
    slot: Arc<Mutex<Slot>>,
}

impl Debouncer {
    /// Creates a debouncer that runs `action` after `window` of quiet
    pub fn new<F>(window: Duration, action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            window,
            action: Arc::new(action),
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Schedules the action, replacing any pending call
    pub fn trigger(&self) {
        let mut slot = lock(&self.slot);
        slot.generation = slot.generation.wrapping_add(1);
        if let Some(previous) = slot.handle.take() {
            previous.abort();
        }

        let generation = slot.generation;
        let shared = Arc::clone(&self.slot);
        let action = Arc::clone(&self.action);
        let window = self.window;

        slot.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            {
                let mut slot = lock(&shared);
                if slot.generation != generation {
                    return;
                }
                slot.handle = None;
            }
            action();
        }));
    }

    /// Discards the pending call without running it
    ///
    /// # Returns
    /// True if a call was pending
    pub fn cancel(&self) -> bool {
        let mut slot = lock(&self.slot);
        slot.generation = slot.generation.wrapping_add(1);
        match slot.handle.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// True while a call is scheduled and has not fired
    pub fn is_pending(&self) -> bool {
        lock(&self.slot).handle.is_some()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{sleep, Instant};

    const WINDOW: Duration = Duration::from_millis(1000);

    struct Probe {
        calls: AtomicUsize,
        fired_at: Mutex<Option<Instant>>,
    }

    fn probed() -> (Debouncer, Arc<Probe>) {
        let probe = Arc::new(Probe {
            calls: AtomicUsize::new(0),
            fired_at: Mutex::new(None),
        });
        let p = probe.clone();
        let debouncer = Debouncer::new(WINDOW, move || {
            p.calls.fetch_add(1, Ordering::SeqCst);
            *p.fired_at.lock().unwrap() = Some(Instant::now());
        });
        (debouncer, probe)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_fires_once_after_quiet_window() {
        let (debouncer, probe) = probed();

        for _ in 0..5 {
            debouncer.trigger();
            sleep(Duration::from_millis(200)).await;
        }
        let last_trigger = Instant::now();
        debouncer.trigger();
        assert!(debouncer.is_pending());

        sleep(Duration::from_millis(999)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(10)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending());

        let fired_at = probe.fired_at.lock().unwrap().unwrap();
        assert!(fired_at.duration_since(last_trigger) >= WINDOW);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_fire_separately() {
        let (debouncer, probe) = probed();

        debouncer.trigger();
        sleep(Duration::from_millis(1500)).await;
        debouncer.trigger();
        debouncer.trigger();
        sleep(Duration::from_millis(1500)).await;

        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_discards_pending_call() {
        let (debouncer, probe) = probed();

        debouncer.trigger();
        sleep(Duration::from_millis(500)).await;
        assert!(debouncer.cancel());
        assert!(!debouncer.cancel());

        sleep(Duration::from_secs(3)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_after_cancel_still_works() {
        let (debouncer, probe) = probed();

        debouncer.trigger();
        debouncer.cancel();
        debouncer.trigger();
        sleep(Duration::from_millis(1100)).await;

        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending_call() {
        let (debouncer, probe) = probed();

        debouncer.trigger();
        drop(debouncer);
        sleep(Duration::from_secs(2)).await;

        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }
}
