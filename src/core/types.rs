// Shared types for the HTTP layer and the batch queue

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::config::Config;
use crate::queue::BatchStore;
use crate::services::ImageProcessor;
use crate::storage::ScratchStorage;
use crate::utils::Metrics;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub processor: Arc<dyn ImageProcessor>,
    pub store: Arc<BatchStore>,
    pub scratch: ScratchStorage,
    pub metrics: Metrics,
}

/// Status of a queued file.
///
/// Entries are created `Queued` and nothing advances them; `Completed` exists
/// only so the batch completion check has something to compare against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Queued,
    Completed,
}

/// One file accepted as part of a batch submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub stored_path: PathBuf,
    pub original_name: String,
    pub batch_id: String,
    pub status: QueueStatus,
}

impl QueueEntry {
    pub fn queued(batch_id: &str, original_name: String, stored_path: PathBuf) -> Self {
        Self {
            stored_path,
            original_name,
            batch_id: batch_id.to_string(),
            status: QueueStatus::Queued,
        }
    }
}

/// Response body for an accepted batch submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSubmitResponse {
    pub message: String,
    pub batch_id: String,
    pub queued_files: Vec<String>,
}

/// Per-file line in a batch status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStatus {
    pub filename: String,
    pub status: QueueStatus,
}

impl From<&QueueEntry> for FileStatus {
    fn from(entry: &QueueEntry) -> Self {
        Self {
            filename: entry.original_name.clone(),
            status: entry.status,
        }
    }
}

/// Response body for a batch status query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStatusResponse {
    pub batch_id: String,
    pub files: Vec<FileStatus>,
    pub completed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&QueueStatus::Queued).unwrap();
        assert_eq!(json, "\"queued\"");
    }

    #[test]
    fn test_file_status_from_entry() {
        let entry = QueueEntry::queued("42", "a.png".into(), PathBuf::from("/tmp/42_a.png"));
        let status = FileStatus::from(&entry);
        assert_eq!(status.filename, "a.png");
        assert_eq!(status.status, QueueStatus::Queued);
    }
}
