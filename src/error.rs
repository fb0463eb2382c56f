//! Error handling for the upload coordinator
//!
//! This module defines the error types surfaced to callers of the
//! coordinator, along with the stable rejection codes a host bridge
//! forwards to its own runtime.

use thiserror::Error;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, UploadError>;

/// Error types that can occur when coordinating uploads
#[derive(Error, Debug)]
pub enum UploadError {
    /// An upload was requested before the storage client was initialized
    #[error("Storage client not initialized")]
    NotInitialized,

    /// The local source cannot be read
    #[error("Invalid local path: {path} - {message}")]
    InvalidLocalPath { path: String, message: String },

    /// Task id generation collided with a registered task
    #[error("Duplicate task id: {task_id}")]
    DuplicateTaskId { task_id: String },

    /// The storage adapter reported a transport or service error
    #[error("Upload failed: {message}")]
    UploadFailed { task_id: String, message: String },

    /// The task was cancelled, by request or by the adapter
    #[error("Upload cancelled: {task_id}")]
    UploadCancelled { task_id: String },

    /// The storage client could not be initialized
    #[error("Storage client init failed: {message}")]
    InitError { message: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl UploadError {
    /// Create a new invalid local path error
    pub fn invalid_local_path(path: impl Into<String>, message: impl Into<String>) -> Self {
        UploadError::InvalidLocalPath {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new duplicate task id error
    pub fn duplicate_task_id(task_id: impl Into<String>) -> Self {
        UploadError::DuplicateTaskId {
            task_id: task_id.into(),
        }
    }

    /// Create a new upload failed error
    pub fn upload_failed(task_id: impl Into<String>, message: impl Into<String>) -> Self {
        UploadError::UploadFailed {
            task_id: task_id.into(),
            message: message.into(),
        }
    }

    /// Create a new upload cancelled error
    pub fn cancelled(task_id: impl Into<String>) -> Self {
        UploadError::UploadCancelled {
            task_id: task_id.into(),
        }
    }

    /// Create a new init error
    pub fn init_error(message: impl Into<String>) -> Self {
        UploadError::InitError {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        UploadError::ConfigError {
            message: message.into(),
        }
    }

    /// Stable rejection code forwarded to the host runtime
    pub fn code(&self) -> &'static str {
        match self {
            UploadError::NotInitialized => "NOT_INITIALIZED",
            UploadError::InvalidLocalPath { .. } => "INVALID_PATH",
            UploadError::DuplicateTaskId { .. } => "DUPLICATE_TASK",
            UploadError::UploadFailed { .. } => "UPLOAD_FAIL",
            UploadError::UploadCancelled { .. } => "UPLOAD_CANCELLED",
            UploadError::InitError { .. } => "INIT_ERROR",
            UploadError::ConfigError { .. } => "CONFIG_ERROR",
            UploadError::Io(_) => "IO_ERROR",
            UploadError::Json(_) => "JSON_ERROR",
        }
    }

    /// Whether this error means the task was cancelled rather than failed
    pub fn is_cancelled(&self) -> bool {
        matches!(self, UploadError::UploadCancelled { .. })
    }

    /// The task this error belongs to, if it was raised for a running task
    pub fn task_id(&self) -> Option<&str> {
        match self {
            UploadError::DuplicateTaskId { task_id }
            | UploadError::UploadFailed { task_id, .. }
            | UploadError::UploadCancelled { task_id } => Some(task_id),
            _ => None,
        }
    }
}
