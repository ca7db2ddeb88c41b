//! Deferred-callback scheduling.
//!
//! Debouncing and request deadlines are expressed as one-shot callbacks
//! scheduled through a [`Scheduler`]. Every scheduled callback returns a
//! [`TaskHandle`] whose `cancel()` guarantees the callback will not start.
//!
//! Two implementations are provided:
//!
//! - [`TokioScheduler`] - runs callbacks on a Tokio runtime using timers
//! - [`ManualScheduler`] - simulated clock advanced explicitly, for tests
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//! use pointquery::scheduler::{ManualScheduler, Scheduler};
//!
//! let scheduler = ManualScheduler::new();
//! let fired = Arc::new(AtomicBool::new(false));
//! let flag = Arc::clone(&fired);
//! scheduler.schedule(Duration::from_millis(10), Box::new(move || {
//!     flag.store(true, Ordering::SeqCst);
//! }));
//!
//! scheduler.advance(Duration::from_millis(10));
//! assert!(fired.load(Ordering::SeqCst));
//! ```

mod manual;
mod runtime;

pub use manual::ManualScheduler;
pub use runtime::TokioScheduler;

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// A deferred, run-once callback.
pub type ScheduledTask = Box<dyn FnOnce() + Send + 'static>;

/// Schedules callbacks to run after a delay.
pub trait Scheduler: Send + Sync {
    /// Run `task` once `delay` has elapsed, unless the returned handle is
    /// cancelled first.
    fn schedule(&self, delay: Duration, task: ScheduledTask) -> TaskHandle;
}

/// Handle to a scheduled callback.
///
/// Cloning shares the same cancellation state. Dropping a handle does not
/// cancel the task.
#[derive(Debug, Clone, Default)]
pub struct TaskHandle {
    token: CancellationToken,
}

impl TaskHandle {
    /// Create a fresh, uncancelled handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prevent the callback from running. Idempotent; a no-op once the
    /// callback has started.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether `cancel` has been called.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}
