//! Simulated-time scheduler.

use std::collections::BTreeMap;
use std::time::Duration;

use parking_lot::Mutex;

use super::{ScheduledTask, Scheduler, TaskHandle};

struct Entry {
    handle: TaskHandle,
    task: ScheduledTask,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_seq: u64,
    /// Keyed by (due time, insertion order) so equal deadlines run FIFO.
    queue: BTreeMap<(Duration, u64), Entry>,
}

/// Scheduler driven by an explicit clock.
///
/// Time only moves when [`advance`](ManualScheduler::advance) is called.
/// Callbacks run on the caller's thread, in deadline order, and may schedule
/// further callbacks that become eligible within the same advance.
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ManualScheduler")
            .field("now", &state.now)
            .field("queued", &state.queue.len())
            .finish()
    }
}

impl ManualScheduler {
    /// Create a scheduler with the clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current simulated time since creation.
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Number of queued callbacks that have not been cancelled.
    pub fn pending(&self) -> usize {
        self.state
            .lock()
            .queue
            .values()
            .filter(|entry| !entry.handle.is_cancelled())
            .count()
    }

    /// Move the clock forward by `delta`, running every callback that falls
    /// due on the way. Returns how many callbacks ran.
    pub fn advance(&self, delta: Duration) -> usize {
        let target = self.state.lock().now + delta;
        let mut ran = 0;

        loop {
            // Pop under the lock, run without it: callbacks may schedule.
            let entry = {
                let mut state = self.state.lock();
                let due = match state.queue.keys().next() {
                    Some(&key) if key.0 <= target => key,
                    _ => break,
                };
                state.now = due.0;
                state.queue.remove(&due)
            };

            if let Some(entry) = entry {
                if entry.handle.is_cancelled() {
                    continue;
                }
                (entry.task)();
                ran += 1;
            }
        }

        self.state.lock().now = target;
        ran
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: ScheduledTask) -> TaskHandle {
        let handle = TaskHandle::new();
        let mut state = self.state.lock();
        let due = state.now + delay;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.queue.insert(
            (due, seq),
            Entry {
                handle: handle.clone(),
                task,
            },
        );
        handle
    }
}
