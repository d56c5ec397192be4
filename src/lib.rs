// Library exports for the background removal service

// Core modules
pub mod api;
pub mod core;
pub mod queue;
pub mod services;
pub mod storage;
pub mod utils;

// Re-export commonly used types and functions
pub use api::build_router;
pub use core::{
    config::Config,
    errors::{ApiError, ConfigError, ProcessingFailure, StorageError, ValidationError},
    types::{AppState, BatchStatusResponse, BatchSubmitResponse, FileStatus, QueueEntry, QueueStatus},
};

pub use queue::BatchStore;
pub use services::{ImageProcessor, OnnxBackgroundRemover};
pub use storage::ScratchStorage;

pub use utils::Metrics;
