use thiserror::Error;

use crate::config::QueueConfig;
use crate::effect::Effect;
use crate::item::{
    FilePayload, IngestStage, SubmissionError, SubmissionId, SubmissionItem, SubmissionOrigin,
    SubmissionStatus,
};
use crate::store::ItemStore;
use crate::validate::{validate, RejectReason};
use crate::view::QueueSnapshot;

/// Why a retry or cancel request was refused.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("unknown submission: {0}")]
    UnknownSubmission(SubmissionId),
    #[error("submission {id} is {status}, only failed submissions can be retried")]
    NotRetryable {
        id: SubmissionId,
        status: SubmissionStatus,
    },
    #[error("submission {id} is already {status}, nothing to cancel")]
    NotCancellable {
        id: SubmissionId,
        status: SubmissionStatus,
    },
}

/// Outcome of admitting one file from an `add_files` batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added(SubmissionId),
    Rejected { name: String, reason: RejectReason },
}

/// The pure half of the submission queue: every status transition lives
/// here, with no IO attached.
///
/// Mutating methods return the [`Effect`]s the caller must carry out. The
/// upload bound is enforced in exactly one place, [`QueueState::schedule`],
/// which the runtime invokes after every handled message; transitions
/// themselves never set a submission to uploading.
///
/// Progress and outcome reports can race a user cancellation, so the
/// `apply_*` methods drop anything that no longer matches the status it was
/// produced under. Terminal states stay terminal.
#[derive(Debug, Clone)]
pub struct QueueState {
    config: QueueConfig,
    store: ItemStore,
    next_id: SubmissionId,
}

impl QueueState {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            store: ItemStore::default(),
            next_id: 1,
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn store(&self) -> &ItemStore {
        &self.store
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot::capture(&self.store)
    }

    /// Validates and enqueues a batch of files. One bad file never blocks
    /// the rest; each candidate gets its own verdict, in input order.
    pub fn add_files(&mut self, files: Vec<FilePayload>) -> Vec<AddOutcome> {
        let mut outcomes = Vec::with_capacity(files.len());
        let mut accepted = self.store.len();
        for file in files {
            match validate(&file, accepted, &self.config) {
                Ok(()) => {
                    let id = self.enqueue(SubmissionOrigin::File(file));
                    accepted += 1;
                    outcomes.push(AddOutcome::Added(id));
                }
                Err(reason) => outcomes.push(AddOutcome::Rejected {
                    name: file.name,
                    reason,
                }),
            }
        }
        outcomes
    }

    /// Enqueues a remote-content reference. URLs skip file validation; the
    /// library service is the one fetching them.
    pub fn add_url(&mut self, url: impl Into<String>) -> SubmissionId {
        self.enqueue(SubmissionOrigin::Url(url.into()))
    }

    fn enqueue(&mut self, origin: SubmissionOrigin) -> SubmissionId {
        let id = self.next_id;
        self.next_id += 1;
        self.store.insert(SubmissionItem::new(id, origin));
        id
    }

    /// Puts a failed submission back in line. Progress, error and the stale
    /// remote id are wiped so the rerun starts from a clean slate.
    pub fn retry(&mut self, id: SubmissionId) -> Result<(), TransitionError> {
        let item = self
            .store
            .get_mut(id)
            .ok_or(TransitionError::UnknownSubmission(id))?;
        if item.status != SubmissionStatus::Failed {
            return Err(TransitionError::NotRetryable {
                id,
                status: item.status,
            });
        }
        item.status = SubmissionStatus::Pending;
        item.progress = 0;
        item.stage = None;
        item.error = None;
        item.remote_id = None;
        Ok(())
    }

    /// Cancels a submission that has not finished yet.
    ///
    /// Pending submissions just flip to failed; active ones additionally
    /// yield a [`Effect::CancelInFlight`] so the runtime stops their worker
    /// or poller. Either way the item stays visible with a cancellation
    /// error, never silently dropped.
    pub fn cancel(&mut self, id: SubmissionId) -> Result<Vec<Effect>, TransitionError> {
        let item = self
            .store
            .get_mut(id)
            .ok_or(TransitionError::UnknownSubmission(id))?;
        match item.status {
            SubmissionStatus::Pending => {
                item.status = SubmissionStatus::Failed;
                item.error = Some(SubmissionError::cancelled());
                Ok(Vec::new())
            }
            SubmissionStatus::Uploading | SubmissionStatus::Processing => {
                item.status = SubmissionStatus::Failed;
                item.stage = None;
                item.error = Some(SubmissionError::cancelled());
                Ok(vec![Effect::CancelInFlight { id }])
            }
            status => Err(TransitionError::NotCancellable { id, status }),
        }
    }

    /// Drops every completed submission, reporting how many went away.
    pub fn clear_completed(&mut self) -> usize {
        self.store.clear_completed()
    }

    /// Records byte progress for an active upload. Stale or regressing
    /// reports are ignored, so the visible percentage only ever climbs.
    pub fn apply_upload_progress(&mut self, id: SubmissionId, percent: u8) {
        if let Some(item) = self.store.get_mut(id) {
            if item.status == SubmissionStatus::Uploading && percent > item.progress {
                item.progress = percent.min(100);
            }
        }
    }

    /// Applies the end of an upload: on success the submission moves to
    /// processing and polling starts, on failure it lands in failed.
    pub fn apply_upload_outcome(
        &mut self,
        id: SubmissionId,
        outcome: Result<String, SubmissionError>,
    ) -> Vec<Effect> {
        let Some(item) = self.store.get_mut(id) else {
            return Vec::new();
        };
        if item.status != SubmissionStatus::Uploading {
            // Late report from a worker that lost a cancellation race.
            return Vec::new();
        }
        match outcome {
            Ok(remote_id) => {
                item.status = SubmissionStatus::Processing;
                item.progress = 100;
                item.remote_id = Some(remote_id.clone());
                vec![Effect::StartPoll { id, remote_id }]
            }
            Err(error) => {
                item.status = SubmissionStatus::Failed;
                item.error = Some(error);
                Vec::new()
            }
        }
    }

    /// Records the ingestion sub-phase reported by the backend.
    pub fn apply_stage(&mut self, id: SubmissionId, stage: IngestStage) {
        if let Some(item) = self.store.get_mut(id) {
            if item.status == SubmissionStatus::Processing {
                item.stage = Some(stage);
            }
        }
    }

    /// Applies the end of polling: `Ok` means the document was ingested,
    /// `Err` carries a backend failure or the polling timeout.
    pub fn apply_poll_outcome(&mut self, id: SubmissionId, outcome: Result<(), SubmissionError>) {
        let Some(item) = self.store.get_mut(id) else {
            return;
        };
        if item.status != SubmissionStatus::Processing {
            return;
        }
        item.stage = None;
        match outcome {
            Ok(()) => item.status = SubmissionStatus::Completed,
            Err(error) => {
                item.status = SubmissionStatus::Failed;
                item.error = Some(error);
            }
        }
    }

    /// Promotes pending submissions, oldest first, until the concurrent
    /// upload bound is reached. The only place that bound is enforced.
    pub fn schedule(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        let mut active = self.store.count_with(SubmissionStatus::Uploading);
        while active < self.config.max_concurrent {
            let Some(id) = self.store.first_pending() else {
                break;
            };
            let Some(item) = self.store.get_mut(id) else {
                break;
            };
            item.status = SubmissionStatus::Uploading;
            item.progress = 0;
            effects.push(Effect::StartUpload {
                id,
                origin: item.origin.clone(),
            });
            active += 1;
        }
        effects
    }
}
