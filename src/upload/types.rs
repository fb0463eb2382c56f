use crate::task::TaskId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Progress callback: `(current, total, task_id)`
pub type ProgressCallback = Arc<dyn Fn(u64, u64, &TaskId) + Send + Sync>;

/// Invoked when the task's `cancelled` event is delivered
pub type CancelCallback = Arc<dyn Fn(&TaskId) + Send + Sync>;

/// Invoked with the adapter's error description when the `failed` event is delivered
pub type FailedCallback = Arc<dyn Fn(&TaskId, &str) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadProgress {
    pub bytes_sent: u64,
    pub total_bytes: u64,
    pub percentage: f64,
}

impl UploadProgress {
    pub fn new(bytes_sent: u64, total_bytes: u64) -> Self {
        let percentage = if total_bytes > 0 {
            bytes_sent as f64 / total_bytes as f64
        } else {
            0.0
        };

        Self {
            bytes_sent,
            total_bytes,
            percentage: percentage.min(1.0),
        }
    }
}

/// Per-upload hooks, all run on the event delivery context
#[derive(Clone, Default)]
pub struct UploadOptions {
    pub on_progress: Option<ProgressCallback>,
    pub on_cancel: Option<CancelCallback>,
    pub on_failed: Option<FailedCallback>,
}

impl std::fmt::Debug for UploadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadOptions")
            .field("on_progress", &self.on_progress.is_some())
            .field("on_cancel", &self.on_cancel.is_some())
            .field("on_failed", &self.on_failed.is_some())
            .finish()
    }
}

impl UploadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(u64, u64, &TaskId) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    pub fn on_cancel<F>(mut self, callback: F) -> Self
    where
        F: Fn(&TaskId) + Send + Sync + 'static,
    {
        self.on_cancel = Some(Arc::new(callback));
        self
    }

    pub fn on_failed<F>(mut self, callback: F) -> Self
    where
        F: Fn(&TaskId, &str) + Send + Sync + 'static,
    {
        self.on_failed = Some(Arc::new(callback));
        self
    }

    pub fn has_hooks(&self) -> bool {
        self.on_progress.is_some() || self.on_cancel.is_some() || self.on_failed.is_some()
    }
}

/// Resolution value of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    /// Response body reported by the adapter
    pub result: String,
    pub upload_id: TaskId,
}
