//! Courier core: pure submission-queue state machine and admission rules.
mod announce;
mod config;
mod effect;
mod item;
mod state;
mod store;
mod validate;
mod view;

pub use announce::{ProgressAnnouncer, ANNOUNCE_STEP};
pub use config::QueueConfig;
pub use effect::Effect;
pub use item::{
    ErrorKind, FilePayload, IngestStage, SubmissionError, SubmissionId, SubmissionItem,
    SubmissionOrigin, SubmissionStatus,
};
pub use state::{AddOutcome, QueueState, TransitionError};
pub use store::ItemStore;
pub use validate::{validate, RejectReason};
pub use view::{QueueSnapshot, StatusCounts};
