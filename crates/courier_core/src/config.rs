use std::time::Duration;

/// Queue policy knobs. The defaults match the documented contract of the
/// submission pipeline; tests shrink them to keep fixtures small.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Upper bound on simultaneously uploading submissions.
    pub max_concurrent: usize,
    /// Fixed delay between ingestion status polls.
    pub poll_interval: Duration,
    /// Wall-clock budget for polling one submission.
    pub poll_timeout: Duration,
    /// Maximum number of status polls for one submission.
    pub poll_max_attempts: u32,
    /// File name extensions accepted for upload, compared case-insensitively.
    pub allowed_extensions: Vec<String>,
    /// Largest accepted file, in bytes.
    pub max_file_bytes: u64,
    /// Maximum number of submissions tracked at once.
    pub max_batch_files: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            poll_interval: Duration::from_secs(5),
            poll_timeout: Duration::from_secs(300),
            poll_max_attempts: 60,
            allowed_extensions: vec![
                "pdf".to_string(),
                "txt".to_string(),
                "md".to_string(),
                "html".to_string(),
                "docx".to_string(),
                "csv".to_string(),
            ],
            max_file_bytes: 50 * 1024 * 1024,
            max_batch_files: 10,
        }
    }
}
