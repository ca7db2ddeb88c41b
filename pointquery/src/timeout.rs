//! Per-request deadline guard.

use std::sync::Arc;
use std::time::Duration;

use crate::dataset::DatasetId;
use crate::scheduler::{Scheduler, TaskHandle};
use crate::surface::{DisplayStatus, RenderSurface};

/// Default deadline for a confirmed lookup.
pub const DEFAULT_REQUEST_DEADLINE: Duration = Duration::from_millis(2000);

/// One-shot deadline for a single dataset's lookup.
///
/// If the guard is not cancelled before the deadline, its expiry action
/// runs. Guards are independent: expiring or cancelling one has no effect
/// on any other.
#[derive(Debug, Clone)]
pub struct TimeoutGuard {
    dataset: DatasetId,
    deadline: Duration,
    handle: TaskHandle,
}

impl TimeoutGuard {
    /// Arm a guard that shows [`DisplayStatus::Timeout`] for `dataset` on
    /// `surface` once `deadline` elapses.
    pub fn start(
        dataset: DatasetId,
        deadline: Duration,
        scheduler: &dyn Scheduler,
        surface: Arc<dyn RenderSurface>,
    ) -> Self {
        Self::with_action(dataset, deadline, scheduler, move |id| {
            surface.set_status(id, DisplayStatus::Timeout);
        })
    }

    /// Arm a guard that calls `on_expire` with the dataset once `deadline`
    /// elapses.
    pub fn with_action<F>(
        dataset: DatasetId,
        deadline: Duration,
        scheduler: &dyn Scheduler,
        on_expire: F,
    ) -> Self
    where
        F: FnOnce(&DatasetId) + Send + 'static,
    {
        let expired_id = dataset.clone();
        let handle = scheduler.schedule(
            deadline,
            Box::new(move || {
                tracing::debug!(dataset = %expired_id, "Request deadline elapsed");
                on_expire(&expired_id);
            }),
        );

        tracing::trace!(dataset = %dataset, deadline_ms = deadline.as_millis() as u64, "Timeout guard armed");

        Self {
            dataset,
            deadline,
            handle,
        }
    }

    /// Suppress the expiry action. Safe to call at any time, any number of
    /// times; has no effect once the guard has fired.
    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }

    /// Dataset this guard watches.
    pub fn dataset(&self) -> &DatasetId {
        &self.dataset
    }

    /// Configured deadline.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }
}
