//! Rendering surface abstraction.
//!
//! The coordinator never touches a concrete UI. It talks to a
//! [`RenderSurface`] that can enumerate the datasets it is displaying and
//! show a status for one of them. [`MemorySurface`] is the in-process
//! implementation used by tests and headless callers.

use std::fmt;

use parking_lot::RwLock;

use crate::dataset::DatasetId;

/// Status shown for a dataset while a query cycle progresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayStatus {
    /// A confirmed lookup has been issued and has not timed out.
    Loading,
    /// The point could not be validated; no lookup was issued.
    InvalidInput,
    /// No response arrived before the request deadline.
    Timeout,
}

impl DisplayStatus {
    /// Text shown to the user.
    pub fn label(&self) -> &'static str {
        match self {
            DisplayStatus::Loading => "Loading...",
            DisplayStatus::InvalidInput => "Invalid input",
            DisplayStatus::Timeout => "Request timeout",
        }
    }

    /// Label wrapped in emphasis markup, for HTML surfaces.
    pub fn markup(&self) -> String {
        format!("<em>{}</em>", self.label())
    }
}

impl fmt::Display for DisplayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A UI that displays one status slot per dataset.
pub trait RenderSurface: Send + Sync {
    /// Dataset identifiers currently displayed, in display order.
    ///
    /// Must reflect the surface's state at call time.
    fn list_ids(&self) -> Vec<DatasetId>;

    /// Show `status` in the slot for `id`.
    ///
    /// Unknown identifiers are ignored.
    fn set_status(&self, id: &DatasetId, status: DisplayStatus);
}

#[derive(Debug, Clone)]
struct Slot {
    id: DatasetId,
    status: Option<DisplayStatus>,
    updates: u64,
}

/// Thread-safe in-memory surface.
///
/// Keeps slots in insertion order and counts how many times each slot was
/// written, which makes ordering assertions straightforward in tests.
#[derive(Debug, Default)]
pub struct MemorySurface {
    slots: RwLock<Vec<Slot>>,
}

impl MemorySurface {
    /// Create an empty surface.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a surface displaying the given datasets.
    pub fn with_datasets<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<DatasetId>,
    {
        let surface = Self::new();
        for id in ids {
            surface.add_dataset(id);
        }
        surface
    }

    /// Append a slot for `id`.
    pub fn add_dataset(&self, id: impl Into<DatasetId>) {
        self.slots.write().push(Slot {
            id: id.into(),
            status: None,
            updates: 0,
        });
    }

    /// Remove every slot for `id`.
    pub fn remove_dataset(&self, id: &DatasetId) {
        self.slots.write().retain(|slot| &slot.id != id);
    }

    /// Current status of the first slot for `id`.
    pub fn status(&self, id: &DatasetId) -> Option<DisplayStatus> {
        self.slots
            .read()
            .iter()
            .find(|slot| &slot.id == id)
            .and_then(|slot| slot.status)
    }

    /// Number of writes to the first slot for `id`.
    pub fn update_count(&self, id: &DatasetId) -> u64 {
        self.slots
            .read()
            .iter()
            .find(|slot| &slot.id == id)
            .map(|slot| slot.updates)
            .unwrap_or(0)
    }

    /// Copy of every slot's identifier and status.
    pub fn snapshot(&self) -> Vec<(DatasetId, Option<DisplayStatus>)> {
        self.slots
            .read()
            .iter()
            .map(|slot| (slot.id.clone(), slot.status))
            .collect()
    }
}

impl RenderSurface for MemorySurface {
    fn list_ids(&self) -> Vec<DatasetId> {
        self.slots.read().iter().map(|slot| slot.id.clone()).collect()
    }

    fn set_status(&self, id: &DatasetId, status: DisplayStatus) {
        for slot in self.slots.write().iter_mut().filter(|slot| &slot.id == id) {
            slot.status = Some(status);
            slot.updates += 1;
        }
    }
}
