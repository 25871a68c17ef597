use std::collections::BTreeMap;

use crate::item::{SubmissionId, SubmissionItem, SubmissionStatus};

/// Ordered collection of submissions, keyed by id.
///
/// Ids are allocated sequentially, so map order is insertion order and stays
/// stable no matter in which order submissions finish.
#[derive(Debug, Clone, Default)]
pub struct ItemStore {
    items: BTreeMap<SubmissionId, SubmissionItem>,
}

impl ItemStore {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: SubmissionId) -> Option<&SubmissionItem> {
        self.items.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: SubmissionId) -> Option<&mut SubmissionItem> {
        self.items.get_mut(&id)
    }

    pub(crate) fn insert(&mut self, item: SubmissionItem) {
        self.items.insert(item.id, item);
    }

    /// Submissions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &SubmissionItem> {
        self.items.values()
    }

    pub fn count_with(&self, status: SubmissionStatus) -> usize {
        self.items
            .values()
            .filter(|item| item.status == status)
            .count()
    }

    /// Earliest-inserted submission still waiting for an upload slot.
    pub(crate) fn first_pending(&self) -> Option<SubmissionId> {
        self.items
            .values()
            .find(|item| item.status == SubmissionStatus::Pending)
            .map(|item| item.id)
    }

    /// Removes every completed submission and reports how many were dropped.
    /// The relative order of the remaining items is untouched.
    pub(crate) fn clear_completed(&mut self) -> usize {
        let before = self.items.len();
        self.items
            .retain(|_, item| item.status != SubmissionStatus::Completed);
        before - self.items.len()
    }
}
