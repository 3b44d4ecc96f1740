//! Cancellable periodic background task.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Smallest interval a task may run at; `tokio::time::interval` rejects zero.
const MIN_PERIOD: Duration = Duration::from_millis(1);

struct Running {
    cancellation: CancellationToken,
    handle: JoinHandle<()>,
}

/// Slot for one periodic background loop.
///
/// The loop calls `tick` once per period until [`stop`](Self::stop) is
/// called, the owner is dropped, or `tick` returns `false`. Starting an
/// already running task and stopping a stopped one are both no-ops.
#[derive(Default)]
pub struct PeriodicTask {
    running: Mutex<Option<Running>>,
}

impl PeriodicTask {
    /// Create an idle task slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a loop is currently attached to this slot.
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Spawn the loop on the current tokio runtime.
    ///
    /// Returns `false` if a loop is already running or no runtime is
    /// available. The first tick happens one full `period` after start.
    pub fn start<F, Fut>(&self, name: &'static str, period: Duration, mut tick: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let mut running = self.running.lock();
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return false;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(task = name, "No tokio runtime available, background task not started");
            return false;
        };

        let cancellation = CancellationToken::new();
        let token = cancellation.clone();
        let period = period.max(MIN_PERIOD);

        let handle = runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!(task = name, "Background task cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        if !tick().await {
                            debug!(task = name, "Background task owner gone, stopping");
                            break;
                        }
                    }
                }
            }
        });

        debug!(task = name, period_ms = period.as_millis() as u64, "Background task started");
        *running = Some(Running {
            cancellation,
            handle,
        });
        true
    }

    /// Signal the loop to stop. Returns `true` if a loop was attached.
    pub fn stop(&self) -> bool {
        match self.running.lock().take() {
            Some(running) => {
                running.cancellation.cancel();
                true
            }
            None => false,
        }
    }

    /// Signal the loop to stop and wait for it to exit.
    pub async fn stop_and_wait(&self) {
        let running = self.running.lock().take();
        if let Some(running) = running {
            running.cancellation.cancel();
            if let Err(e) = running.handle.await
                && e.is_panic()
            {
                warn!(error = %e, "Background task panicked");
            }
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.cancellation.cancel();
        }
    }
}

impl std::fmt::Debug for PeriodicTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicTask")
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_ticks_until_stopped() {
        let task = PeriodicTask::new();
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);

        assert!(task.start("test", Duration::from_millis(10), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }
        }));
        assert!(task.is_running());

        tokio::time::sleep(Duration::from_millis(80)).await;
        task.stop_and_wait().await;
        let seen = ticks.load(Ordering::SeqCst);
        assert!(seen >= 2, "expected several ticks, saw {seen}");

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
        assert!(!task.is_running());
    }

    #[tokio::test]
    async fn test_start_twice_is_noop() {
        let task = PeriodicTask::new();
        assert!(task.start("test", Duration::from_secs(60), || async { true }));
        assert!(!task.start("test", Duration::from_secs(60), || async { true }));
        assert!(task.stop());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let task = PeriodicTask::new();
        assert!(!task.stop());
        task.start("test", Duration::from_secs(60), || async { true });
        assert!(task.stop());
        assert!(!task.stop());
        task.stop_and_wait().await;
    }

    #[tokio::test]
    async fn test_tick_returning_false_ends_loop() {
        let task = PeriodicTask::new();
        task.start("test", Duration::from_millis(5), || async { false });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_running());
    }

    #[test]
    fn test_start_without_runtime() {
        let task = PeriodicTask::new();
        assert!(!task.start("test", Duration::from_secs(1), || async { true }));
        assert!(!task.is_running());
    }
}
