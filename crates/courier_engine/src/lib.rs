//! Courier engine: library-service client and the queue runtime.
mod client;
mod poll;
mod queue;
mod types;
mod upload;

pub use client::{ClientSettings, HttpLibraryClient, LibraryClient};
pub use poll::PollSettings;
pub use queue::{QueueError, QueueHandle};
pub use types::{
    IngestionReport, ProgressSink, RemoteStatus, SubmitReceipt, TransferError, TransferFailureKind,
};
