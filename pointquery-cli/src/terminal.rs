//! Terminal rendering surface.
//!
//! Prints one line per status change and keeps the latest status of each
//! dataset so a summary table can be printed at the end of a run.

use parking_lot::Mutex;
use pointquery::dataset::DatasetId;
use pointquery::surface::{DisplayStatus, RenderSurface};

/// Rendering surface backed by stdout.
#[derive(Debug)]
pub struct TerminalSurface {
    rows: Mutex<Vec<(DatasetId, Option<DisplayStatus>)>>,
    width: usize,
}

impl TerminalSurface {
    /// Display the given datasets, in order.
    pub fn new(ids: Vec<DatasetId>) -> Self {
        let width = ids.iter().map(|id| id.as_str().len()).max().unwrap_or(0);
        Self {
            rows: Mutex::new(ids.into_iter().map(|id| (id, None)).collect()),
            width,
        }
    }

    /// Print every dataset and its latest status.
    pub fn print_summary(&self) {
        let rows = self.rows.lock();
        println!();
        println!("{:<width$}  Status", "Dataset", width = self.width.max(7));
        println!("{}", "-".repeat(self.width.max(7) + 18));
        for (id, status) in rows.iter() {
            let label = status.map(|s| s.label()).unwrap_or("-");
            println!("{:<width$}  {}", id, label, width = self.width.max(7));
        }
    }

    /// Latest status for `id`.
    #[cfg(test)]
    pub fn status(&self, id: &DatasetId) -> Option<DisplayStatus> {
        self.rows
            .lock()
            .iter()
            .find(|(row, _)| row == id)
            .and_then(|(_, status)| *status)
    }
}

impl RenderSurface for TerminalSurface {
    fn list_ids(&self) -> Vec<DatasetId> {
        self.rows.lock().iter().map(|(id, _)| id.clone()).collect()
    }

    fn set_status(&self, id: &DatasetId, status: DisplayStatus) {
        let mut rows = self.rows.lock();
        let Some(row) = rows.iter_mut().find(|(row, _)| row == id) else {
            return;
        };
        row.1 = Some(status);

        println!("  {:<width$}  {}", id, status, width = self.width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracks_latest_status() {
        let surface = TerminalSurface::new(vec![DatasetId::from("srtm30m"), DatasetId::from("etopo1")]);
        let srtm = DatasetId::from("srtm30m");

        surface.set_status(&srtm, DisplayStatus::Loading);
        surface.set_status(&srtm, DisplayStatus::Timeout);
        surface.set_status(&DatasetId::from("unknown"), DisplayStatus::Loading);

        assert_eq!(surface.status(&srtm), Some(DisplayStatus::Timeout));
        assert_eq!(surface.status(&DatasetId::from("etopo1")), None);
        assert_eq!(surface.list_ids().len(), 2);
    }
}
