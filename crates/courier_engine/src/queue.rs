use std::collections::HashMap;
use std::sync::Arc;

use courier_logging::{courier_debug, courier_info, courier_warn};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use courier_core::{
    AddOutcome, Effect, ErrorKind, FilePayload, IngestStage, QueueConfig, QueueSnapshot,
    QueueState, SubmissionError, SubmissionId, TransitionError,
};

use crate::client::LibraryClient;
use crate::poll::{run_poll, PollSettings};
use crate::types::{SubmitReceipt, TransferError};
use crate::upload::run_upload;

/// Error surfaced by [`QueueHandle`] operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("queue runtime is no longer running")]
    Closed,
}

enum Command {
    AddFiles {
        files: Vec<FilePayload>,
        reply: oneshot::Sender<Vec<AddOutcome>>,
    },
    AddUrl {
        url: String,
        reply: oneshot::Sender<SubmissionId>,
    },
    Retry {
        id: SubmissionId,
        reply: oneshot::Sender<Result<(), TransitionError>>,
    },
    Cancel {
        id: SubmissionId,
        reply: oneshot::Sender<Result<(), TransitionError>>,
    },
    ClearCompleted {
        reply: oneshot::Sender<usize>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Reports flowing back from transfer workers and status pollers.
pub(crate) enum TaskEvent {
    UploadProgress {
        id: SubmissionId,
        percent: u8,
    },
    UploadFinished {
        id: SubmissionId,
        outcome: Result<SubmitReceipt, TransferError>,
    },
    PollStage {
        id: SubmissionId,
        stage: IngestStage,
    },
    PollFinished {
        id: SubmissionId,
        outcome: Result<(), SubmissionError>,
    },
}

/// Cloneable handle to a running submission queue.
///
/// All mutation funnels through the runtime task behind this handle, which
/// is the only writer of queue state. Observers subscribe to snapshots and
/// issue the control calls below; they never touch items directly.
#[derive(Clone)]
pub struct QueueHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<QueueSnapshot>,
}

impl QueueHandle {
    /// Starts the queue runtime. Must be called from within a tokio runtime.
    ///
    /// The runtime stops when [`QueueHandle::shutdown`] is called or every
    /// handle has been dropped; either way all in-flight work is cancelled.
    pub fn spawn(config: QueueConfig, client: Arc<dyn LibraryClient>) -> Self {
        let (commands, command_rx) = mpsc::channel(32);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshots) = watch::channel(QueueSnapshot::default());
        let runtime = QueueRuntime {
            state: QueueState::new(config),
            client,
            tokens: HashMap::new(),
            events_tx,
            snapshots: snapshot_tx,
        };
        tokio::spawn(runtime.run(command_rx, events_rx));
        Self {
            commands,
            snapshots,
        }
    }

    /// Validates and enqueues a batch of files, reporting a verdict per
    /// file in input order.
    pub async fn add_files(&self, files: Vec<FilePayload>) -> Result<Vec<AddOutcome>, QueueError> {
        self.request(|reply| Command::AddFiles { files, reply }).await
    }

    /// Enqueues a URL for server-side fetching and ingestion.
    pub async fn add_url(&self, url: impl Into<String>) -> Result<SubmissionId, QueueError> {
        let url = url.into();
        self.request(|reply| Command::AddUrl { url, reply }).await
    }

    /// Sends a failed submission through the pipeline again.
    pub async fn retry_upload(&self, id: SubmissionId) -> Result<(), QueueError> {
        Ok(self
            .request(|reply| Command::Retry { id, reply })
            .await??)
    }

    /// Cancels a submission that has not reached an end state yet.
    pub async fn cancel_upload(&self, id: SubmissionId) -> Result<(), QueueError> {
        Ok(self
            .request(|reply| Command::Cancel { id, reply })
            .await??)
    }

    /// Removes every completed submission from the queue.
    pub async fn clear_completed(&self) -> Result<usize, QueueError> {
        self.request(|reply| Command::ClearCompleted { reply }).await
    }

    /// Stops the runtime after cancelling all in-flight work.
    pub async fn shutdown(&self) -> Result<(), QueueError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    /// Subscribes to queue snapshots; a fresh one is published after every
    /// handled message.
    pub fn subscribe(&self) -> watch::Receiver<QueueSnapshot> {
        self.snapshots.clone()
    }

    /// The queue as of the last handled message.
    pub fn snapshot(&self) -> QueueSnapshot {
        self.snapshots.borrow().clone()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, QueueError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .await
            .map_err(|_| QueueError::Closed)?;
        reply_rx.await.map_err(|_| QueueError::Closed)
    }
}

/// The queue actor: sole owner of the state machine and the cancellation
/// token registry.
struct QueueRuntime {
    state: QueueState,
    client: Arc<dyn LibraryClient>,
    /// One token per submission with a live worker or poller. Entries are
    /// removed exactly once, when the task ends or is cancelled.
    tokens: HashMap<SubmissionId, CancellationToken>,
    events_tx: mpsc::UnboundedSender<TaskEvent>,
    snapshots: watch::Sender<QueueSnapshot>,
}

impl QueueRuntime {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut events: mpsc::UnboundedReceiver<TaskEvent>,
    ) {
        courier_info!(
            "submission queue running, at most {} concurrent uploads",
            self.state.config().max_concurrent
        );
        loop {
            let effects = tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    match self.handle_command(command) {
                        Some(effects) => effects,
                        None => return,
                    }
                }
                Some(event) = events.recv() => self.handle_event(event),
            };
            self.execute(effects);
            // Every mutation ends with a scheduling pass and a snapshot, so
            // observers never see the upload bound violated or underused.
            let admitted = self.state.schedule();
            self.execute(admitted);
            self.snapshots.send_replace(self.state.snapshot());
        }
        self.teardown();
    }

    /// Handles one control call. `None` means shutdown was requested.
    fn handle_command(&mut self, command: Command) -> Option<Vec<Effect>> {
        match command {
            Command::AddFiles { files, reply } => {
                let outcomes = self.state.add_files(files);
                for outcome in &outcomes {
                    match outcome {
                        AddOutcome::Added(id) => courier_debug!("submission {id} queued"),
                        AddOutcome::Rejected { name, reason } => {
                            courier_warn!("rejected {name}: {reason}");
                        }
                    }
                }
                let _ = reply.send(outcomes);
                Some(Vec::new())
            }
            Command::AddUrl { url, reply } => {
                let id = self.state.add_url(url);
                courier_debug!("submission {id} queued");
                let _ = reply.send(id);
                Some(Vec::new())
            }
            Command::Retry { id, reply } => {
                let result = self.state.retry(id);
                if result.is_ok() {
                    courier_debug!("submission {id} requeued");
                }
                let _ = reply.send(result);
                Some(Vec::new())
            }
            Command::Cancel { id, reply } => match self.state.cancel(id) {
                Ok(effects) => {
                    courier_debug!("submission {id} cancelled");
                    let _ = reply.send(Ok(()));
                    Some(effects)
                }
                Err(err) => {
                    let _ = reply.send(Err(err));
                    Some(Vec::new())
                }
            },
            Command::ClearCompleted { reply } => {
                let removed = self.state.clear_completed();
                courier_debug!("cleared {removed} completed submissions");
                let _ = reply.send(removed);
                Some(Vec::new())
            }
            Command::Shutdown { reply } => {
                self.teardown();
                let _ = reply.send(());
                None
            }
        }
    }

    /// Applies one worker or poller report. Stale reports are dropped by
    /// the state machine; token bookkeeping below tolerates that.
    fn handle_event(&mut self, event: TaskEvent) -> Vec<Effect> {
        match event {
            TaskEvent::UploadProgress { id, percent } => {
                self.state.apply_upload_progress(id, percent);
                Vec::new()
            }
            TaskEvent::UploadFinished { id, outcome } => {
                let outcome = match outcome {
                    Ok(receipt) => {
                        courier_debug!("submission {id} accepted as {}", receipt.remote_id);
                        Ok(receipt.remote_id)
                    }
                    Err(err) => {
                        courier_warn!("upload for submission {id} failed: {err}");
                        Err(SubmissionError::new(ErrorKind::Transfer, err.to_string()))
                    }
                };
                let effects = self.state.apply_upload_outcome(id, outcome);
                self.release_if_settled(id);
                effects
            }
            TaskEvent::PollStage { id, stage } => {
                self.state.apply_stage(id, stage);
                Vec::new()
            }
            TaskEvent::PollFinished { id, outcome } => {
                match &outcome {
                    Ok(()) => courier_info!("submission {id} completed"),
                    Err(err) => courier_warn!("submission {id} failed: {err}"),
                }
                self.state.apply_poll_outcome(id, outcome);
                self.release_if_settled(id);
                Vec::new()
            }
        }
    }

    fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::StartUpload { id, origin } => {
                    courier_debug!("submission {id} uploading ({})", origin.label());
                    let token = CancellationToken::new();
                    self.tokens.insert(id, token.clone());
                    tokio::spawn(run_upload(
                        self.client.clone(),
                        id,
                        origin,
                        token,
                        self.events_tx.clone(),
                    ));
                }
                Effect::StartPoll { id, remote_id } => {
                    // The token minted at upload start stays attached, so a
                    // cancel during processing stops this poller too.
                    let token = match self.tokens.get(&id) {
                        Some(token) => token.clone(),
                        None => {
                            let token = CancellationToken::new();
                            self.tokens.insert(id, token.clone());
                            token
                        }
                    };
                    tokio::spawn(run_poll(
                        self.client.clone(),
                        id,
                        remote_id,
                        PollSettings::from_config(self.state.config()),
                        token,
                        self.events_tx.clone(),
                    ));
                }
                Effect::CancelInFlight { id } => {
                    if let Some(token) = self.tokens.remove(&id) {
                        token.cancel();
                    }
                }
            }
        }
    }

    /// Returns a submission's token once it has settled. Cancellation may
    /// already have removed it; releasing twice finds nothing and is fine.
    fn release_if_settled(&mut self, id: SubmissionId) {
        let settled = self
            .state
            .store()
            .get(id)
            .map_or(true, |item| !item.status.is_active());
        if settled {
            self.tokens.remove(&id);
        }
    }

    fn teardown(&mut self) {
        let live = self.tokens.len();
        for (_, token) in self.tokens.drain() {
            token.cancel();
        }
        courier_info!("submission queue stopped, {live} tasks cancelled");
    }
}
