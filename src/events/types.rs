use crate::error::{Result, UploadError};
use crate::task::TaskId;
use serde::{Deserialize, Serialize};

/// Name of the single outbound channel carrying events for every task
pub const PROGRESS_CHANNEL: &str = "UploadProgress";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEventKind {
    Progress { current: u64, total: u64 },
    Completed,
    Failed { error: String },
    Cancelled,
}

impl ProgressEventKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ProgressEventKind::Progress { .. } => "progress",
            ProgressEventKind::Completed => "completed",
            ProgressEventKind::Failed { .. } => "failed",
            ProgressEventKind::Cancelled => "cancelled",
        }
    }
}

/// A message published on the progress channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub task_id: TaskId,
    pub kind: ProgressEventKind,
}

impl ProgressEvent {
    pub fn progress(task_id: TaskId, current: u64, total: u64) -> Self {
        Self {
            task_id,
            kind: ProgressEventKind::Progress { current, total },
        }
    }

    pub fn completed(task_id: TaskId) -> Self {
        Self {
            task_id,
            kind: ProgressEventKind::Completed,
        }
    }

    pub fn failed(task_id: TaskId, error: impl Into<String>) -> Self {
        Self {
            task_id,
            kind: ProgressEventKind::Failed {
                error: error.into(),
            },
        }
    }

    pub fn cancelled(task_id: TaskId) -> Self {
        Self {
            task_id,
            kind: ProgressEventKind::Cancelled,
        }
    }

    /// Completed, failed and cancelled events end a task's stream
    pub fn is_terminal(&self) -> bool {
        !matches!(self.kind, ProgressEventKind::Progress { .. })
    }

    /// Channel body as forwarded to the host runtime
    pub fn to_payload(&self) -> ProgressPayload {
        let mut payload = ProgressPayload {
            task_id: self.task_id.to_string(),
            kind: self.kind.type_name().to_string(),
            current: None,
            total: None,
            error: None,
        };

        match &self.kind {
            ProgressEventKind::Progress { current, total } => {
                payload.current = Some(*current);
                payload.total = Some(*total);
            }
            ProgressEventKind::Failed { error } => payload.error = Some(error.clone()),
            ProgressEventKind::Completed | ProgressEventKind::Cancelled => {}
        }

        payload
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.to_payload()).map_err(UploadError::from)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let payload: ProgressPayload = serde_json::from_str(json)?;
        Self::try_from(payload)
    }
}

/// Wire form of a [`ProgressEvent`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPayload {
    pub task_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TryFrom<ProgressPayload> for ProgressEvent {
    type Error = UploadError;

    fn try_from(payload: ProgressPayload) -> Result<Self> {
        let task_id = TaskId::from(payload.task_id);
        let kind = match payload.kind.as_str() {
            "progress" => match (payload.current, payload.total) {
                (Some(current), Some(total)) => ProgressEventKind::Progress { current, total },
                _ => {
                    return Err(UploadError::config_error(
                        "progress payload requires current and total",
                    ))
                }
            },
            "completed" => ProgressEventKind::Completed,
            "failed" => ProgressEventKind::Failed {
                error: payload.error.unwrap_or_default(),
            },
            "cancelled" => ProgressEventKind::Cancelled,
            other => {
                return Err(UploadError::config_error(format!(
                    "unknown progress event type: {}",
                    other
                )))
            }
        };

        Ok(ProgressEvent { task_id, kind })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_payload_shape() {
        let event = ProgressEvent::progress(TaskId::from("b:k:1"), 250, 1000);
        let json: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();

        assert_eq!(json["taskId"], "b:k:1");
        assert_eq!(json["type"], "progress");
        assert_eq!(json["current"], 250);
        assert_eq!(json["total"], 1000);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_terminal_payloads() {
        let failed = ProgressEvent::failed(TaskId::from("t"), "403 Forbidden");
        let payload = failed.to_payload();
        assert_eq!(payload.kind, "failed");
        assert_eq!(payload.error.as_deref(), Some("403 Forbidden"));
        assert!(failed.is_terminal());

        let cancelled = ProgressEvent::cancelled(TaskId::from("t")).to_payload();
        assert_eq!(cancelled.kind, "cancelled");
        assert!(cancelled.current.is_none());
    }

    #[test]
    fn test_payload_parsing() {
        let event =
            ProgressEvent::from_json(r#"{"taskId":"t","type":"progress","current":1,"total":2}"#)
                .unwrap();
        assert_eq!(
            event.kind,
            ProgressEventKind::Progress {
                current: 1,
                total: 2
            }
        );

        assert!(ProgressEvent::from_json(r#"{"taskId":"t","type":"progress"}"#).is_err());
        assert!(ProgressEvent::from_json(r#"{"taskId":"t","type":"paused"}"#).is_err());
    }
}
