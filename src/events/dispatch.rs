//! Delivery context for progress events
//!
//! Adapters report from their own threads. Every event and every caller
//! settlement passes through an [`EventDispatcher`] before it reaches
//! subscriber code, so handlers run on one known context in publish order.

use crate::error::{Result, UploadError};
use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A unit of work run on the delivery context
pub type DispatchJob = Box<dyn FnOnce() + Send + 'static>;

/// Runs jobs on the consumer-visible delivery context, in submission order
pub trait EventDispatcher: Send + Sync {
    fn dispatch(&self, job: DispatchJob);
}

/// Which delivery context a coordinator uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Run handlers directly on the reporting thread
    Inline,
    /// Run handlers on a single dedicated tokio task
    #[default]
    Queued,
}

impl DispatchMode {
    /// Build the dispatcher for this mode; queued mode needs a tokio runtime
    pub fn dispatcher(self) -> Result<Arc<dyn EventDispatcher>> {
        match self {
            DispatchMode::Inline => Ok(Arc::new(InlineDispatcher)),
            DispatchMode::Queued => Ok(Arc::new(QueuedDispatcher::spawn_current()?)),
        }
    }
}

/// Delivers on the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineDispatcher;

impl EventDispatcher for InlineDispatcher {
    fn dispatch(&self, job: DispatchJob) {
        job();
    }
}

/// Delivers on a single tokio task fed by an unbounded FIFO queue
#[derive(Debug, Clone)]
pub struct QueuedDispatcher {
    tx: mpsc::UnboundedSender<DispatchJob>,
}

impl QueuedDispatcher {
    /// Spawn the delivery task on the given runtime
    pub fn spawn(runtime: &tokio::runtime::Handle) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<DispatchJob>();
        runtime.spawn(async move {
            while let Some(job) = rx.recv().await {
                job();
            }
        });
        Self { tx }
    }

    /// Spawn the delivery task on the runtime of the caller
    pub fn spawn_current() -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            UploadError::config_error(format!("queued dispatch needs a tokio runtime: {}", e))
        })?;
        Ok(Self::spawn(&runtime))
    }
}

impl EventDispatcher for QueuedDispatcher {
    fn dispatch(&self, job: DispatchJob) {
        // A dead delivery task means the runtime is shutting down; run the
        // job here rather than leave a caller unsettled.
        if let Err(mpsc::error::SendError(job)) = self.tx.send(job) {
            warn!("Event delivery task is gone, delivering inline");
            job();
        }
    }
}
