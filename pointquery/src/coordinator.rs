//! Elevation query coordinator.
//!
//! Fans a single point out to every displayed dataset, in two flavours:
//!
//! - **prefetch** - speculative, silent lookups that warm the server's cache
//!   while the user is still typing. Invoked through a debounced trigger.
//! - **fetch** - the confirmed lookup run on form submission. Every dataset
//!   shows "Loading..." synchronously, then each one independently shows
//!   "Request timeout" if its deadline passes before it is settled.
//!
//! # Lifecycle
//!
//! ```text
//!            fetch()                   deadline
//!   Idle ─────────────► Loading ───────────────► TimedOut
//!                          │
//!                          │ settle()
//!                          ▼
//!                         Idle
//! ```
//!
//! Per-dataset state belongs to the current fetch cycle only. Starting a
//! new cycle cancels the previous cycle's guards so that an older deadline
//! can never overwrite a newer "Loading...". Requests already issued are not
//! aborted.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::dataset::{DatasetId, DatasetRegistry};
use crate::debounce::{debounce, Debouncer, Operation};
use crate::point::{Point, PointInput};
use crate::scheduler::Scheduler;
use crate::service::{ElevationService, QueryMode, QueryRequest};
use crate::surface::{DisplayStatus, RenderSurface};
use crate::timeout::{TimeoutGuard, DEFAULT_REQUEST_DEADLINE};

/// Default quiet period before a prefetch runs.
pub const DEFAULT_PREFETCH_QUIET_PERIOD: Duration = Duration::from_millis(1000);

/// Timing configuration for the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// How long a confirmed lookup may stay loading before it times out.
    pub request_deadline: Duration,

    /// Quiet period the prefetch trigger waits for.
    pub prefetch_quiet_period: Duration,

    /// Run prefetch on the first input of a burst instead of after it.
    pub prefetch_leading_edge: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            request_deadline: DEFAULT_REQUEST_DEADLINE,
            prefetch_quiet_period: DEFAULT_PREFETCH_QUIET_PERIOD,
            prefetch_leading_edge: false,
        }
    }
}

impl CoordinatorConfig {
    /// Set the request deadline.
    pub fn with_request_deadline(mut self, deadline: Duration) -> Self {
        self.request_deadline = deadline;
        self
    }

    /// Set the prefetch quiet period.
    pub fn with_prefetch_quiet_period(mut self, wait: Duration) -> Self {
        self.prefetch_quiet_period = wait;
        self
    }

    /// Enable or disable leading-edge prefetch.
    pub fn with_prefetch_leading_edge(mut self, leading: bool) -> Self {
        self.prefetch_leading_edge = leading;
        self
    }
}

/// Lifecycle of one dataset's lookup within a fetch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// No lookup outstanding.
    Idle,
    /// Lookup issued, deadline not yet reached.
    Loading,
    /// Deadline reached without the lookup being settled.
    TimedOut,
}

/// What a call to [`QueryCoordinator::fetch`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The point was invalid; every dataset shows "Invalid input".
    InvalidInput { datasets: usize },
    /// Lookups were issued for `datasets` datasets in cycle `cycle`.
    Dispatched { cycle: u64, datasets: usize },
}

struct TrackedRequest {
    state: RequestState,
    guard: Option<TimeoutGuard>,
}

#[derive(Default)]
struct FetchCycle {
    id: u64,
    requests: HashMap<DatasetId, TrackedRequest>,
}

impl FetchCycle {
    fn cancel_guards(&self) {
        for request in self.requests.values() {
            if let Some(guard) = &request.guard {
                guard.cancel();
            }
        }
    }
}

struct CoordinatorInner {
    config: CoordinatorConfig,
    input: Arc<dyn PointInput>,
    surface: Arc<dyn RenderSurface>,
    registry: DatasetRegistry,
    service: Arc<dyn ElevationService>,
    scheduler: Arc<dyn Scheduler>,
    cycle: Mutex<FetchCycle>,
}

/// Coordinates prefetch and confirmed lookups for the point in a form.
///
/// Cheap to clone; clones share the same fetch cycle.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use pointquery::coordinator::{CoordinatorConfig, QueryCoordinator};
/// use pointquery::dataset::DatasetId;
/// use pointquery::point::PointForm;
/// use pointquery::scheduler::ManualScheduler;
/// use pointquery::service::RecordingService;
/// use pointquery::surface::{DisplayStatus, MemorySurface};
///
/// let form = Arc::new(PointForm::with_values("12.5", "-8.3"));
/// let surface = Arc::new(MemorySurface::with_datasets(["srtm30m"]));
/// let scheduler = Arc::new(ManualScheduler::new());
/// let coordinator = QueryCoordinator::new(
///     CoordinatorConfig::default(),
///     form,
///     surface.clone(),
///     Arc::new(RecordingService::new()),
///     scheduler.clone(),
/// );
///
/// coordinator.fetch();
/// let srtm = DatasetId::from("srtm30m");
/// assert_eq!(surface.status(&srtm), Some(DisplayStatus::Loading));
///
/// scheduler.advance(Duration::from_millis(2000));
/// assert_eq!(surface.status(&srtm), Some(DisplayStatus::Timeout));
/// ```
#[derive(Clone)]
pub struct QueryCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl fmt::Debug for QueryCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCoordinator")
            .field("config", &self.inner.config)
            .field("cycle", &self.inner.cycle.lock().id)
            .finish_non_exhaustive()
    }
}

impl QueryCoordinator {
    /// Wire a coordinator to its collaborators.
    pub fn new(
        config: CoordinatorConfig,
        input: Arc<dyn PointInput>,
        surface: Arc<dyn RenderSurface>,
        service: Arc<dyn ElevationService>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        let registry = DatasetRegistry::new(Arc::clone(&surface));
        Self {
            inner: Arc::new(CoordinatorInner {
                config,
                input,
                surface,
                registry,
                service,
                scheduler,
                cycle: Mutex::new(FetchCycle::default()),
            }),
        }
    }

    /// Timing configuration.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    /// Issue one speculative lookup per dataset for the current point.
    ///
    /// Silent: invalid input or an empty dataset list do nothing, and the
    /// surface is never touched. Returns the number of lookups issued.
    pub fn prefetch(&self) -> usize {
        let Some(point) = self.inner.input.read_point() else {
            tracing::trace!("Prefetch skipped: no valid point");
            return 0;
        };

        let datasets = self.inner.registry.list_dataset_ids();
        if datasets.is_empty() {
            tracing::trace!("Prefetch skipped: no datasets displayed");
            return 0;
        }

        for dataset in &datasets {
            self.dispatch(&point, dataset, QueryMode::Prefetch);
        }

        tracing::debug!(point = %point, datasets = datasets.len(), "Prefetch issued");
        datasets.len()
    }

    /// Build a debounced trigger that runs [`prefetch`](Self::prefetch)
    /// after the configured quiet period.
    pub fn prefetch_trigger(&self) -> Debouncer {
        let coordinator = self.clone();
        let op: Operation = Arc::new(move || {
            coordinator.prefetch();
        });
        debounce(
            op,
            self.inner.config.prefetch_quiet_period,
            self.inner.config.prefetch_leading_edge,
            Arc::clone(&self.inner.scheduler),
        )
    }

    /// Run a confirmed lookup for the current point.
    ///
    /// Every displayed dataset's status is written before this returns:
    /// "Invalid input" when the point is invalid (no lookups issued),
    /// otherwise "Loading..." followed by one guarded lookup per dataset.
    /// Either way the submission starts a new cycle, retiring the guards
    /// of the previous one.
    pub fn fetch(&self) -> FetchOutcome {
        let point = self.inner.input.read_point();
        let datasets = self.inner.registry.list_dataset_ids();

        // Status writes and guard expiry are serialized on the cycle lock,
        // so a retired guard can never write over this cycle's statuses.
        let mut cycle = self.inner.cycle.lock();

        let Some(point) = point else {
            let cycle_id = begin_cycle(&mut cycle, &[]);
            self.set_all(&datasets, DisplayStatus::InvalidInput);
            drop(cycle);

            tracing::debug!(
                cycle = cycle_id,
                datasets = datasets.len(),
                "Fetch rejected: invalid input"
            );
            return FetchOutcome::InvalidInput {
                datasets: datasets.len(),
            };
        };

        let cycle_id = begin_cycle(&mut cycle, &datasets);
        self.set_all(&datasets, DisplayStatus::Loading);
        for dataset in &datasets {
            let guard = self.arm_guard(cycle_id, dataset);
            if let Some(request) = cycle.requests.get_mut(dataset) {
                request.guard = Some(guard);
            }
        }
        drop(cycle);

        tracing::info!(
            cycle = cycle_id,
            point = %point,
            datasets = datasets.len(),
            "Fetch cycle started"
        );

        for dataset in &datasets {
            self.dispatch(&point, dataset, QueryMode::Confirmed);
        }

        FetchOutcome::Dispatched {
            cycle: cycle_id,
            datasets: datasets.len(),
        }
    }

    /// Mark `dataset`'s lookup in the current cycle as finished.
    ///
    /// Cancels its timeout guard and returns it to [`RequestState::Idle`].
    /// Returns `false` if the dataset has no loading lookup in this cycle.
    pub fn settle(&self, dataset: &DatasetId) -> bool {
        let mut cycle = self.inner.cycle.lock();
        let Some(request) = cycle.requests.get_mut(dataset) else {
            return false;
        };
        if request.state != RequestState::Loading {
            return false;
        }

        if let Some(guard) = request.guard.take() {
            guard.cancel();
        }
        request.state = RequestState::Idle;
        tracing::debug!(dataset = %dataset, "Lookup settled");
        true
    }

    /// State of `dataset` in the current cycle.
    pub fn request_state(&self, dataset: &DatasetId) -> RequestState {
        self.inner
            .cycle
            .lock()
            .requests
            .get(dataset)
            .map(|request| request.state)
            .unwrap_or(RequestState::Idle)
    }

    /// Identifier of the current fetch cycle; zero before the first fetch.
    pub fn current_cycle(&self) -> u64 {
        self.inner.cycle.lock().id
    }

    fn arm_guard(&self, cycle_id: u64, dataset: &DatasetId) -> TimeoutGuard {
        let inner = Arc::downgrade(&self.inner);
        TimeoutGuard::with_action(
            dataset.clone(),
            self.inner.config.request_deadline,
            self.inner.scheduler.as_ref(),
            move |id| {
                if let Some(inner) = inner.upgrade() {
                    inner.expire(cycle_id, id);
                }
            },
        )
    }

    fn dispatch(&self, point: &Point, dataset: &DatasetId, mode: QueryMode) {
        let request = QueryRequest::new(point.clone(), dataset.clone(), mode);
        self.inner.service.dispatch(&request);
    }

    fn set_all(&self, datasets: &[DatasetId], status: DisplayStatus) {
        for dataset in datasets {
            self.inner.surface.set_status(dataset, status);
        }
    }
}

impl CoordinatorInner {
    /// Deadline callback for `dataset` in cycle `cycle_id`.
    fn expire(&self, cycle_id: u64, dataset: &DatasetId) {
        let mut cycle = self.cycle.lock();
        if cycle.id != cycle_id {
            return;
        }
        match cycle.requests.get_mut(dataset) {
            Some(request) if request.state == RequestState::Loading => {
                request.state = RequestState::TimedOut;
                request.guard = None;
            }
            _ => return,
        }

        tracing::debug!(cycle = cycle_id, dataset = %dataset, "Lookup timed out");
        self.surface.set_status(dataset, DisplayStatus::Timeout);
    }
}

/// Replace `cycle` with a fresh one tracking `datasets`, cancelling the
/// guards of the cycle it replaces.
fn begin_cycle(cycle: &mut FetchCycle, datasets: &[DatasetId]) -> u64 {
    cycle.cancel_guards();

    let id = cycle.id + 1;
    *cycle = FetchCycle {
        id,
        requests: datasets
            .iter()
            .map(|dataset| {
                (
                    dataset.clone(),
                    TrackedRequest {
                        state: RequestState::Loading,
                        guard: None,
                    },
                )
            })
            .collect(),
    };
    id
}
