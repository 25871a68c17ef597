use crate::item::{SubmissionId, SubmissionOrigin};

/// Work the runtime must carry out after a state transition.
///
/// The state machine itself performs no IO; it hands these back to whoever
/// drives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Launch a transfer worker for a submission that just won an upload slot.
    StartUpload {
        id: SubmissionId,
        origin: SubmissionOrigin,
    },
    /// Start polling ingestion status for a submission the service accepted.
    StartPoll {
        id: SubmissionId,
        remote_id: String,
    },
    /// Stop the worker or poller currently attached to a submission.
    CancelInFlight { id: SubmissionId },
}
