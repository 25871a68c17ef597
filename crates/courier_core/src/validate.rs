use thiserror::Error;

use crate::config::QueueConfig;
use crate::item::FilePayload;

/// Why a candidate file was refused admission.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RejectReason {
    #[error("unsupported file type: {name}")]
    UnsupportedType { name: String },
    #[error("{name} is {size} bytes, over the {max_bytes} byte limit")]
    TooLarge {
        name: String,
        size: u64,
        max_bytes: u64,
    },
    #[error("batch is full, at most {max_files} submissions may be tracked")]
    BatchFull { max_files: usize },
}

/// Checks one candidate file against the admission rules.
///
/// `accepted` is the number of submissions already tracked plus any admitted
/// earlier in the same batch, so a single call sequence cannot overshoot the
/// batch ceiling. Rules are checked in order: type, size, count.
pub fn validate(
    file: &FilePayload,
    accepted: usize,
    config: &QueueConfig,
) -> Result<(), RejectReason> {
    if !is_extension_allowed(&file.name, &config.allowed_extensions) {
        return Err(RejectReason::UnsupportedType {
            name: file.name.clone(),
        });
    }
    let size = file.bytes.len() as u64;
    if size > config.max_file_bytes {
        return Err(RejectReason::TooLarge {
            name: file.name.clone(),
            size,
            max_bytes: config.max_file_bytes,
        });
    }
    if accepted >= config.max_batch_files {
        return Err(RejectReason::BatchFull {
            max_files: config.max_batch_files,
        });
    }
    Ok(())
}

fn is_extension_allowed(name: &str, allowed: &[String]) -> bool {
    let Some((stem, extension)) = name.rsplit_once('.') else {
        return false;
    };
    if stem.is_empty() {
        // Dotfiles like ".pdf" have no usable stem.
        return false;
    }
    allowed
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(extension))
}
