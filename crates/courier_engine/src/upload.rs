use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use courier_core::{SubmissionId, SubmissionOrigin};

use crate::client::LibraryClient;
use crate::queue::TaskEvent;
use crate::types::ProgressSink;

/// Forwards byte progress into the runtime's event queue.
pub(crate) struct ChannelProgressSink {
    id: SubmissionId,
    events: UnboundedSender<TaskEvent>,
}

impl ChannelProgressSink {
    pub(crate) fn new(id: SubmissionId, events: UnboundedSender<TaskEvent>) -> Self {
        Self { id, events }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn publish(&self, percent: u8) {
        let _ = self.events.send(TaskEvent::UploadProgress {
            id: self.id,
            percent,
        });
    }
}

/// Runs one upload to completion or cancellation.
///
/// When the token fires, the request future is dropped mid-flight and no
/// outcome is reported; the scheduler recorded the cancellation before
/// firing the token, so it expects silence.
pub(crate) async fn run_upload(
    client: Arc<dyn LibraryClient>,
    id: SubmissionId,
    origin: SubmissionOrigin,
    token: CancellationToken,
    events: UnboundedSender<TaskEvent>,
) {
    let sink = Arc::new(ChannelProgressSink::new(id, events.clone()));
    tokio::select! {
        _ = token.cancelled() => {}
        outcome = client.submit(origin, sink) => {
            let _ = events.send(TaskEvent::UploadFinished { id, outcome });
        }
    }
}
