use std::fmt;

use courier_core::IngestStage;
use thiserror::Error;

/// Error raised while talking to the library service, either during the
/// upload itself or while polling ingestion status.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct TransferError {
    pub kind: TransferFailureKind,
    pub message: String,
}

impl TransferError {
    pub(crate) fn new(kind: TransferFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferFailureKind {
    /// The service base URL does not form a usable request URL.
    InvalidUrl,
    /// The payload could not be turned into a request body.
    InvalidPayload,
    /// Connection-level trouble: refused, reset, DNS.
    Network,
    /// The request ran past the configured client timeout.
    Timeout,
    /// The service answered with a non-success status code.
    HttpStatus(u16),
    /// The service answered 2xx with a body we cannot interpret.
    BadResponse,
}

impl fmt::Display for TransferFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferFailureKind::InvalidUrl => write!(f, "invalid url"),
            TransferFailureKind::InvalidPayload => write!(f, "invalid payload"),
            TransferFailureKind::Network => write!(f, "network error"),
            TransferFailureKind::Timeout => write!(f, "timeout"),
            TransferFailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            TransferFailureKind::BadResponse => write!(f, "bad response"),
        }
    }
}

/// What the service hands back for an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    /// Server-side document id, the key for all later status polls.
    pub remote_id: String,
    /// Initial ingestion status as reported in the submit response.
    pub status: String,
}

/// One answer from the ingestion status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionReport {
    pub status: RemoteStatus,
    /// Failure detail, populated when the status is failed.
    pub error: Option<String>,
    /// Sub-phase the ingestion pipeline is in, when the service reports one.
    pub stage: Option<IngestStage>,
}

/// Ingestion status vocabulary of the library service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl RemoteStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Byte-progress observer for an in-flight upload.
///
/// Implementations must be cheap and non-blocking; the transfer path calls
/// this between body chunks.
pub trait ProgressSink: Send + Sync {
    fn publish(&self, percent: u8);
}
