use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::upload::types::UploadProgress;

static NEXT_TASK_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier of one upload task
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generate a fresh id for an upload to `bucket`/`key`.
    ///
    /// The id combines the destination, the wall clock in milliseconds, a
    /// process-wide sequence number and a short random suffix, so two uploads
    /// to the same destination started in the same millisecond still differ.
    pub fn generate(bucket: &str, key: &str) -> Self {
        let millis = Utc::now().timestamp_millis();
        let sequence = NEXT_TASK_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        TaskId(format!(
            "{}:{}:{}-{}-{}",
            bucket,
            key,
            millis,
            sequence,
            &suffix[..8]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        TaskId(value)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        TaskId(value.to_string())
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TaskId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Lifecycle state of an upload task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    /// Terminal states accept no further transitions
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }

    /// Whether `self -> next` is a legal lifecycle step.
    ///
    /// Every task passes through `InProgress` before reaching a terminal state.
    pub fn can_transition_to(self, next: TaskState) -> bool {
        match (self, next) {
            (TaskState::Pending, TaskState::InProgress) => true,
            (TaskState::InProgress, next) => next.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Pending => write!(f, "pending"),
            TaskState::InProgress => write!(f, "in_progress"),
            TaskState::Completed => write!(f, "completed"),
            TaskState::Failed => write!(f, "failed"),
            TaskState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One in-flight or finished upload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTask {
    pub id: TaskId,
    pub bucket: String,
    pub key: String,
    pub local_path: PathBuf,
    pub state: TaskState,
    pub bytes_sent: u64,
    pub total_bytes: u64,
    pub started_at: DateTime<Utc>,
}

impl UploadTask {
    pub fn new(
        id: TaskId,
        bucket: impl Into<String>,
        key: impl Into<String>,
        local_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id,
            bucket: bucket.into(),
            key: key.into(),
            local_path: local_path.into(),
            state: TaskState::Pending,
            bytes_sent: 0,
            total_bytes: 0,
            started_at: Utc::now(),
        }
    }

    /// Move to `next` if the lifecycle allows it; returns whether it moved
    pub fn transition(&mut self, next: TaskState) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        self.state = next;
        true
    }

    /// Record adapter-reported counters; ignored once the task is terminal.
    ///
    /// Counters never move backwards, even if an adapter reports out of order.
    pub fn record_progress(&mut self, current: u64, total: u64) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        if self.state == TaskState::Pending {
            self.state = TaskState::InProgress;
        }
        self.bytes_sent = self.bytes_sent.max(current);
        self.total_bytes = self.total_bytes.max(total);
        true
    }

    pub fn progress(&self) -> UploadProgress {
        UploadProgress::new(self.bytes_sent, self.total_bytes)
    }
}
