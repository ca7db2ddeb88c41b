//! Tokio-backed scheduler.

use std::time::Duration;

use tokio::runtime::Handle;

use super::{ScheduledTask, Scheduler, TaskHandle};

/// Runs scheduled callbacks as Tokio tasks after a `tokio::time::sleep`.
///
/// Cancellation races the sleep through the handle's token, so a cancelled
/// callback never starts.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Schedule onto the given runtime.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Schedule onto the runtime of the calling context, if any.
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: ScheduledTask) -> TaskHandle {
        let handle = TaskHandle::new();
        let token = handle.token().clone();

        self.handle.spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if !token.is_cancelled() {
                        task();
                    }
                }
            }
        });

        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_task(counter: &Arc<AtomicUsize>) -> ScheduledTask {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    /// Let spawned tasks observe the advanced clock.
    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_after_delay() {
        let scheduler = TokioScheduler::try_current().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        scheduler.schedule(Duration::from_millis(2000), counting_task(&counter));
        settle().await;

        tokio::time::advance(Duration::from_millis(1999)).await;
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_run() {
        let scheduler = TokioScheduler::try_current().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        let handle = scheduler.schedule(Duration::from_millis(50), counting_task(&counter));
        settle().await;
        handle.cancel();

        tokio::time::advance(Duration::from_millis(100)).await;
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_try_current_outside_runtime() {
        assert!(TokioScheduler::try_current().is_none());
    }
}
