pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use config::Config;
pub use errors::{ApiError, ConfigError, ProcessingFailure, StorageError, ValidationError};
pub use types::{
    AppState, BatchStatusResponse, BatchSubmitResponse, FileStatus, QueueEntry, QueueStatus,
};
