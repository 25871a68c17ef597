use std::fmt;
use std::time::SystemTime;

use bytes::Bytes;

/// Identifier for one tracked submission. Allocated sequentially, never
/// reused for the lifetime of a queue.
pub type SubmissionId = u64;

/// An owned file handed over by the caller for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePayload {
    /// File name as presented by the caller, including its extension.
    pub name: String,
    /// Full file contents. `Bytes` keeps clones cheap while the payload
    /// travels from admission to the transfer worker.
    pub bytes: Bytes,
    /// Declared MIME type, if the caller knows one.
    pub content_type: Option<String>,
}

/// What a submission points at: local bytes or remote content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOrigin {
    File(FilePayload),
    Url(String),
}

impl SubmissionOrigin {
    /// Short human-readable label for log lines and presentation rows.
    pub fn label(&self) -> &str {
        match self {
            SubmissionOrigin::File(payload) => &payload.name,
            SubmissionOrigin::Url(url) => url,
        }
    }
}

/// Lifecycle state of a submission.
///
/// Transitions only move forward: pending -> uploading -> processing ->
/// completed or failed. The one exception is an explicit retry, which puts
/// a failed submission back to pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStatus {
    Pending,
    Uploading,
    Processing,
    Completed,
    Failed,
}

impl SubmissionStatus {
    /// True once the submission has reached an end state.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// True while a worker or poller is attached to the submission.
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Uploading | Self::Processing)
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        })
    }
}

/// Backend-reported sub-phase while a submission is processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Downloading,
    Extracting,
    Analyzing,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Downloading => "downloading",
            Self::Extracting => "extracting",
            Self::Analyzing => "analyzing",
        })
    }
}

/// Broad category of a submission failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The upload itself failed: connection trouble or a server rejection.
    Transfer,
    /// The library service accepted the upload but could not ingest it.
    Backend,
    /// Ingestion did not reach an end state within the polling budget.
    Timeout,
    /// The user cancelled the submission.
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Transfer => "transfer",
            Self::Backend => "backend",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Why a submission failed, kept on the item so the presentation layer can
/// show it next to the retry control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionError {
    pub kind: ErrorKind,
    pub message: String,
}

impl SubmissionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "cancelled by user")
    }
}

impl fmt::Display for SubmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// One user-initiated unit of work tracked by the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionItem {
    pub id: SubmissionId,
    pub origin: SubmissionOrigin,
    pub status: SubmissionStatus,
    /// Upload progress in percent. 100 once the transfer has finished;
    /// processing has no byte-level progress.
    pub progress: u8,
    /// Set only while processing, and only when the backend reports one.
    pub stage: Option<IngestStage>,
    /// Set exactly when the status is failed.
    pub error: Option<SubmissionError>,
    /// Server-side document id, known once the upload was accepted.
    pub remote_id: Option<String>,
    pub created_at: SystemTime,
}

impl SubmissionItem {
    pub(crate) fn new(id: SubmissionId, origin: SubmissionOrigin) -> Self {
        Self {
            id,
            origin,
            status: SubmissionStatus::Pending,
            progress: 0,
            stage: None,
            error: None,
            remote_id: None,
            created_at: SystemTime::now(),
        }
    }
}
