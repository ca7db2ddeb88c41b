//! Debounced trigger.
//!
//! Collapses a burst of `fire()` calls into a single run of the wrapped
//! operation once the caller has been quiet for the configured window.
//!
//! ```text
//! fire  fire   fire                 fire
//!  |     |      |                    |
//!  v     v      v                    v
//! -+-----+------+------- W ------X---+------- W ------X-->
//!                                op                   op
//! ```
//!
//! With `leading_edge` enabled the operation also runs immediately on the
//! first call of a burst, and the trailing run is suppressed.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::scheduler::{Scheduler, TaskHandle};

/// A zero-argument, side-effecting operation.
pub type Operation = Arc<dyn Fn() + Send + Sync + 'static>;

#[derive(Default)]
struct Pending {
    handle: Option<TaskHandle>,
    /// Incremented on every `fire()`; a scheduled run only counts as the
    /// expiry of the current burst if its generation is still current.
    generation: u64,
}

struct DebounceInner {
    op: Operation,
    wait: Duration,
    leading_edge: bool,
    scheduler: Arc<dyn Scheduler>,
    pending: Mutex<Pending>,
}

/// Trigger returned by [`debounce`].
///
/// Cheap to clone; clones share the same pending run.
#[derive(Clone)]
pub struct Debouncer {
    inner: Arc<DebounceInner>,
}

impl fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debouncer")
            .field("wait", &self.inner.wait)
            .field("leading_edge", &self.inner.leading_edge)
            .field("is_pending", &self.is_pending())
            .finish()
    }
}

/// Wrap `op` so that it runs once per quiet period of length `wait`.
pub fn debounce(
    op: Operation,
    wait: Duration,
    leading_edge: bool,
    scheduler: Arc<dyn Scheduler>,
) -> Debouncer {
    Debouncer {
        inner: Arc::new(DebounceInner {
            op,
            wait,
            leading_edge,
            scheduler,
            pending: Mutex::new(Pending::default()),
        }),
    }
}

impl Debouncer {
    /// Register an input event.
    ///
    /// Cancels any scheduled run and schedules a new one `wait` from now.
    /// Nothing from the operation is returned to the caller.
    pub fn fire(&self) {
        let call_now;
        {
            let mut pending = self.inner.pending.lock();
            call_now = self.inner.leading_edge && pending.handle.is_none();

            if let Some(previous) = pending.handle.take() {
                previous.cancel();
                tracing::trace!("Debounce rescheduled");
            }

            pending.generation += 1;
            let generation = pending.generation;
            let inner = Arc::clone(&self.inner);
            let handle = self
                .inner
                .scheduler
                .schedule(self.inner.wait, Box::new(move || inner.expire(generation)));
            pending.handle = Some(handle);
        }

        if call_now {
            (self.inner.op)();
        }
    }

    /// Cancel the scheduled run, if any.
    pub fn cancel(&self) {
        if let Some(handle) = self.inner.pending.lock().handle.take() {
            handle.cancel();
        }
    }

    /// Whether a run is currently scheduled.
    pub fn is_pending(&self) -> bool {
        self.inner.pending.lock().handle.is_some()
    }
}

impl DebounceInner {
    fn expire(&self, generation: u64) {
        {
            let mut pending = self.pending.lock();
            if pending.generation != generation {
                return;
            }
            pending.handle = None;
        }

        if !self.leading_edge {
            (self.op)();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const WAIT: Duration = Duration::from_millis(1000);

    fn counting(leading_edge: bool) -> (Arc<ManualScheduler>, Arc<AtomicUsize>, Debouncer) {
        let scheduler = Arc::new(ManualScheduler::new());
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let op: Operation = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let trigger = debounce(op, WAIT, leading_edge, scheduler.clone());
        (scheduler, count, trigger)
    }

    #[test]
    fn test_burst_runs_once_after_last_fire() {
        let (scheduler, count, trigger) = counting(false);

        for _ in 0..5 {
            trigger.fire();
            scheduler.advance(Duration::from_millis(300));
        }
        // Last fire at t=1200; no run yet.
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.now(), Duration::from_millis(1500));

        // Runs exactly W after the last fire (t=2200).
        scheduler.advance(Duration::from_millis(699));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        scheduler.advance(Duration::from_millis(1));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        scheduler.advance(Duration::from_secs(10));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!trigger.is_pending());
    }

    #[test]
    fn test_separate_quiet_periods_run_separately() {
        let (scheduler, count, trigger) = counting(false);

        trigger.fire();
        scheduler.advance(WAIT);
        trigger.fire();
        scheduler.advance(WAIT);

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cancel_drops_pending_run() {
        let (scheduler, count, trigger) = counting(false);

        trigger.fire();
        assert!(trigger.is_pending());
        trigger.cancel();
        scheduler.advance(WAIT * 2);

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_leading_edge_runs_immediately_once_per_burst() {
        let (scheduler, count, trigger) = counting(true);

        trigger.fire();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        trigger.fire();
        scheduler.advance(Duration::from_millis(500));
        trigger.fire();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Burst ends without a trailing run.
        scheduler.advance(WAIT);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // A new burst leads again.
        trigger.fire();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_clones_share_pending_run() {
        let (scheduler, count, trigger) = counting(false);
        let other = trigger.clone();

        trigger.fire();
        scheduler.advance(Duration::from_millis(900));
        other.fire();
        scheduler.advance(Duration::from_millis(900));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        scheduler.advance(Duration::from_millis(100));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
