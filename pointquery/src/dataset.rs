//! Dataset identifiers and the registry reader.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::surface::RenderSurface;

/// Opaque name of one elevation dataset on the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatasetId(String);

impl DatasetId {
    /// Create an identifier from any string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for DatasetId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DatasetId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for DatasetId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Reads the datasets of interest from a rendering surface.
///
/// Nothing is cached: every call re-reads the surface, because the set of
/// displayed datasets may change between renders.
#[derive(Clone)]
pub struct DatasetRegistry {
    surface: Arc<dyn RenderSurface>,
}

impl fmt::Debug for DatasetRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetRegistry").finish_non_exhaustive()
    }
}

impl DatasetRegistry {
    /// Create a registry reading from `surface`.
    pub fn new(surface: Arc<dyn RenderSurface>) -> Self {
        Self { surface }
    }

    /// Current dataset identifiers in surface order.
    ///
    /// Blank identifiers are skipped and repeats collapse onto their first
    /// occurrence, so each dataset is queried once per cycle.
    pub fn list_dataset_ids(&self) -> Vec<DatasetId> {
        let mut seen = HashSet::new();
        self.surface
            .list_ids()
            .into_iter()
            .filter(|id| {
                if id.as_str().trim().is_empty() {
                    tracing::debug!("Skipping blank dataset identifier");
                    return false;
                }
                seen.insert(id.clone())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::MemorySurface;

    #[test]
    fn test_registry_follows_surface_order() {
        let surface = Arc::new(MemorySurface::with_datasets(["srtm30m", "aster30m", "etopo1"]));
        let registry = DatasetRegistry::new(surface);
        let ids: Vec<String> = registry
            .list_dataset_ids()
            .iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(ids, vec!["srtm30m", "aster30m", "etopo1"]);
    }

    #[test]
    fn test_registry_empty_surface() {
        let registry = DatasetRegistry::new(Arc::new(MemorySurface::new()));
        assert!(registry.list_dataset_ids().is_empty());
    }

    #[test]
    fn test_registry_rereads_surface() {
        let surface = Arc::new(MemorySurface::with_datasets(["a"]));
        let registry = DatasetRegistry::new(surface.clone());
        assert_eq!(registry.list_dataset_ids().len(), 1);

        surface.add_dataset("b");
        assert_eq!(registry.list_dataset_ids().len(), 2);
    }

    #[test]
    fn test_registry_skips_blank_and_duplicates() {
        let surface = Arc::new(MemorySurface::with_datasets(["a", " ", "b", "a"]));
        let registry = DatasetRegistry::new(surface);
        assert_eq!(
            registry.list_dataset_ids(),
            vec![DatasetId::from("a"), DatasetId::from("b")]
        );
    }
}
