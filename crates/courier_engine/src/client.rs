use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use courier_core::{IngestStage, SubmissionOrigin};

use crate::types::{
    IngestionReport, ProgressSink, RemoteStatus, SubmitReceipt, TransferError, TransferFailureKind,
};

/// Upload bodies are handed to the transport in slices of this size; each
/// slice bumps the progress sink once.
const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Library service root, e.g. `https://library.internal:8443`.
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl ClientSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// The wire seam of the engine: submits documents and polls their ingestion
/// status. Tests swap in scripted implementations.
#[async_trait::async_trait]
pub trait LibraryClient: Send + Sync {
    /// Pushes one submission to the service. File bytes stream through
    /// `progress`; URL submissions produce no intermediate progress.
    async fn submit(
        &self,
        origin: SubmissionOrigin,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<SubmitReceipt, TransferError>;

    /// Asks the service how ingestion of a submitted document is going.
    async fn fetch_status(&self, remote_id: &str) -> Result<IngestionReport, TransferError>;
}

/// Production client for the document library HTTP API.
#[derive(Debug, Clone)]
pub struct HttpLibraryClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    ingestion_status: String,
    #[serde(default)]
    ingestion_error: Option<String>,
    #[serde(default)]
    stage: Option<String>,
}

impl HttpLibraryClient {
    pub fn new(settings: ClientSettings) -> Result<Self, TransferError> {
        let http = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| TransferError::new(TransferFailureKind::Network, err.to_string()))?;
        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn documents_url(&self) -> String {
        format!("{}/api/documents", self.base_url)
    }

    fn status_url(&self, remote_id: &str) -> String {
        format!("{}/api/documents/{remote_id}/status", self.base_url)
    }
}

#[async_trait::async_trait]
impl LibraryClient for HttpLibraryClient {
    async fn submit(
        &self,
        origin: SubmissionOrigin,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<SubmitReceipt, TransferError> {
        let request = match origin {
            SubmissionOrigin::File(payload) => {
                let length = payload.bytes.len() as u64;
                let body = progress_body(payload.bytes, progress);
                let mut part =
                    Part::stream_with_length(body, length).file_name(payload.name.clone());
                if let Some(mime) = payload.content_type.as_deref() {
                    part = part.mime_str(mime).map_err(|err| {
                        TransferError::new(TransferFailureKind::InvalidPayload, err.to_string())
                    })?;
                }
                let form = Form::new().text("title", payload.name).part("file", part);
                self.http.post(self.documents_url()).multipart(form)
            }
            SubmissionOrigin::Url(url) => self
                .http
                .post(self.documents_url())
                .json(&serde_json::json!({ "url": url })),
        };

        let response = request.send().await.map_err(|err| map_reqwest_error(err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::new(
                TransferFailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let body: SubmitResponse = response.json().await.map_err(|err| {
            TransferError::new(TransferFailureKind::BadResponse, err.to_string())
        })?;
        Ok(SubmitReceipt {
            remote_id: body.id,
            status: body.status,
        })
    }

    async fn fetch_status(&self, remote_id: &str) -> Result<IngestionReport, TransferError> {
        let response = self
            .http
            .get(self.status_url(remote_id))
            .send()
            .await
            .map_err(|err| map_reqwest_error(err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::new(
                TransferFailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let body: StatusResponse = response.json().await.map_err(|err| {
            TransferError::new(TransferFailureKind::BadResponse, err.to_string())
        })?;
        Ok(IngestionReport {
            status: parse_remote_status(&body.ingestion_status)?,
            error: body.ingestion_error,
            stage: body.stage.as_deref().and_then(parse_stage),
        })
    }
}

/// Wraps the payload in a stream that reports cumulative percentages as the
/// transport pulls chunks off it.
fn progress_body(bytes: Bytes, progress: Arc<dyn ProgressSink>) -> reqwest::Body {
    reqwest::Body::wrap_stream(stream::iter(progress_chunks(bytes, progress)))
}

/// Splits the payload into transport-sized chunks; handing one out reports
/// the cumulative percentage. Slicing `Bytes` is refcount-cheap.
fn progress_chunks(
    bytes: Bytes,
    progress: Arc<dyn ProgressSink>,
) -> impl Iterator<Item = Result<Bytes, std::convert::Infallible>> {
    let total = bytes.len();
    let mut chunks = Vec::with_capacity(total / UPLOAD_CHUNK_BYTES + 1);
    let mut offset = 0;
    while offset < total {
        let end = (offset + UPLOAD_CHUNK_BYTES).min(total);
        chunks.push(bytes.slice(offset..end));
        offset = end;
    }

    let mut sent = 0usize;
    chunks.into_iter().map(move |chunk| {
        sent += chunk.len();
        let percent = if total == 0 {
            100
        } else {
            ((sent * 100) / total) as u8
        };
        progress.publish(percent);
        Ok(chunk)
    })
}

fn parse_remote_status(raw: &str) -> Result<RemoteStatus, TransferError> {
    match raw {
        "pending" => Ok(RemoteStatus::Pending),
        "processing" => Ok(RemoteStatus::Processing),
        "completed" => Ok(RemoteStatus::Completed),
        "failed" => Ok(RemoteStatus::Failed),
        other => Err(TransferError::new(
            TransferFailureKind::BadResponse,
            format!("unknown ingestion_status {other:?}"),
        )),
    }
}

/// Stage names are advisory; anything we do not recognize is dropped rather
/// than failing the poll.
fn parse_stage(raw: &str) -> Option<IngestStage> {
    match raw {
        "downloading" => Some(IngestStage::Downloading),
        "extracting" => Some(IngestStage::Extracting),
        "analyzing" => Some(IngestStage::Analyzing),
        _ => None,
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransferError {
    if err.is_timeout() {
        return TransferError::new(TransferFailureKind::Timeout, err.to_string());
    }
    if err.is_builder() {
        return TransferError::new(TransferFailureKind::InvalidUrl, err.to_string());
    }
    TransferError::new(TransferFailureKind::Network, err.to_string())
}
