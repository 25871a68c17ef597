use crate::item::{SubmissionItem, SubmissionStatus};
use crate::store::ItemStore;

/// Immutable picture of the queue, cheap enough to publish after every
/// mutation and hand to observers on other tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueSnapshot {
    /// All tracked submissions in insertion order.
    pub items: Vec<SubmissionItem>,
    pub counts: StatusCounts,
}

impl QueueSnapshot {
    pub(crate) fn capture(store: &ItemStore) -> Self {
        let items: Vec<SubmissionItem> = store.iter().cloned().collect();
        let counts = StatusCounts::tally(items.iter());
        Self { items, counts }
    }

    /// Finds one submission by id.
    pub fn item(&self, id: u64) -> Option<&SubmissionItem> {
        self.items.iter().find(|item| item.id == id)
    }
}

/// Per-status totals for the whole queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub uploading: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StatusCounts {
    fn tally<'a>(items: impl Iterator<Item = &'a SubmissionItem>) -> Self {
        let mut counts = Self::default();
        for item in items {
            match item.status {
                SubmissionStatus::Pending => counts.pending += 1,
                SubmissionStatus::Uploading => counts.uploading += 1,
                SubmissionStatus::Processing => counts.processing += 1,
                SubmissionStatus::Completed => counts.completed += 1,
                SubmissionStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.pending + self.uploading + self.processing + self.completed + self.failed
    }
}
