use std::sync::Arc;
use std::time::Duration;

use courier_logging::courier_warn;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use courier_core::{ErrorKind, QueueConfig, SubmissionError, SubmissionId};

use crate::client::LibraryClient;
use crate::queue::TaskEvent;
use crate::types::RemoteStatus;

/// Fixed-interval polling cadence and its two ceilings. Whichever ceiling
/// is hit first ends the poll with a timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub budget: Duration,
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            budget: Duration::from_secs(300),
            max_attempts: 60,
        }
    }
}

impl PollSettings {
    pub fn from_config(config: &QueueConfig) -> Self {
        Self {
            interval: config.poll_interval,
            budget: config.poll_timeout,
            max_attempts: config.poll_max_attempts,
        }
    }
}

/// Polls ingestion status until the document settles, a ceiling is hit, or
/// the token fires. Cancellation reports nothing, same as the upload side.
///
/// A failed poll request is not a failed ingestion: the attempt is spent
/// and the next tick tries again. Only the service saying "failed", or the
/// ceilings, settle a submission unfavourably.
pub(crate) async fn run_poll(
    client: Arc<dyn LibraryClient>,
    id: SubmissionId,
    remote_id: String,
    settings: PollSettings,
    token: CancellationToken,
    events: UnboundedSender<TaskEvent>,
) {
    let started = Instant::now();
    let mut attempts = 0u32;

    let outcome = loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = sleep(settings.interval) => {}
        }

        if attempts >= settings.max_attempts || started.elapsed() > settings.budget {
            break Err(timeout_error(&settings, attempts));
        }
        attempts += 1;

        let report = tokio::select! {
            _ = token.cancelled() => return,
            report = client.fetch_status(&remote_id) => report,
        };

        match report {
            Ok(report) => match report.status {
                RemoteStatus::Completed => break Ok(()),
                RemoteStatus::Failed => {
                    break Err(SubmissionError::new(
                        ErrorKind::Backend,
                        report
                            .error
                            .unwrap_or_else(|| "ingestion failed".to_string()),
                    ));
                }
                RemoteStatus::Pending | RemoteStatus::Processing => {
                    if let Some(stage) = report.stage {
                        let _ = events.send(TaskEvent::PollStage { id, stage });
                    }
                }
            },
            Err(err) => {
                courier_warn!("status poll {attempts} for submission {id} failed: {err}");
            }
        }
    };

    let _ = events.send(TaskEvent::PollFinished { id, outcome });
}

fn timeout_error(settings: &PollSettings, attempts: u32) -> SubmissionError {
    SubmissionError::new(
        ErrorKind::Timeout,
        format!(
            "ingestion did not settle within {}s ({attempts} status polls)",
            settings.budget.as_secs()
        ),
    )
}
