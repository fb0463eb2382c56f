//! Upload coordination
//!
//! [`UploadCoordinator`] runs each upload end to end: it validates the
//! request, registers a task, subscribes the caller's hooks to the progress
//! channel, starts the adapter transfer, relays progress, and settles the
//! caller's future when the task reaches a terminal state.
//!
//! Terminal ownership is decided by registry eviction. Whoever removes the
//! entry first (the adapter's terminal callback, `cancel_upload`, or
//! `cancel_all`) transitions the task, publishes the terminal event and
//! settles the future. Anything arriving later for that id is dropped.

use crate::adapter::{PutObjectRequest, TransferOutcome};
use crate::callback::{Completion, TransferCallbacks, TransferSink, UploadFuture};
use crate::client::StorageClient;
use crate::error::{Result, UploadError};
use crate::events::{ProgressEvent, ProgressEventBus, ProgressEventKind, SubscriptionToken};
use crate::task::{TaskEntry, TaskId, TaskRegistry, TaskState, UploadTask};
use crate::upload::source::resolve_local_path;
use crate::upload::types::{UploadOptions, UploadResult};
use log::{debug, info, warn};
use std::sync::{Arc, Weak};

pub(crate) struct CoordinatorShared {
    pub(crate) client: StorageClient,
    pub(crate) registry: TaskRegistry,
    pub(crate) bus: ProgressEventBus,
}

/// Entry point for starting and cancelling uploads
#[derive(Clone)]
pub struct UploadCoordinator {
    pub(crate) shared: Arc<CoordinatorShared>,
}

impl UploadCoordinator {
    pub fn new(client: StorageClient, bus: ProgressEventBus) -> Self {
        Self {
            shared: Arc::new(CoordinatorShared {
                client,
                registry: TaskRegistry::new(),
                bus,
            }),
        }
    }

    pub fn client(&self) -> &StorageClient {
        &self.shared.client
    }

    pub fn bus(&self) -> &ProgressEventBus {
        &self.shared.bus
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.shared.registry
    }

    /// Snapshot of a registered task
    pub fn task(&self, task_id: &str) -> Option<UploadTask> {
        self.shared.registry.lookup(task_id)
    }

    /// Ids of every task still in flight
    pub fn active_tasks(&self) -> Vec<TaskId> {
        self.shared.registry.ids()
    }

    /// Start uploading `local_path` to `bucket`/`key`.
    ///
    /// Fails fast with `NotInitialized` or `InvalidLocalPath` before touching
    /// the registry or the progress channel. Otherwise returns at once; the
    /// future settles when the transfer completes, fails or is cancelled.
    pub fn start_upload(
        &self,
        bucket: &str,
        key: &str,
        local_path: &str,
        options: UploadOptions,
    ) -> Result<UploadFuture> {
        let adapter = self.shared.client.adapter()?;
        let source = resolve_local_path(local_path)?;

        let task_id = TaskId::generate(bucket, key);
        let completion = Arc::new(Completion::new());
        let task = UploadTask::new(task_id.clone(), bucket, key, source.clone());
        self.shared.registry.register(task, completion.clone())?;

        let token = self.subscribe_hooks(&task_id, options);
        if !self.shared.registry.set_subscription(task_id.as_str(), token) {
            self.shared.bus.unsubscribe(token);
        }

        let shared: Weak<CoordinatorShared> = Arc::downgrade(&self.shared);
        let callbacks = TransferCallbacks::new(task_id.clone(), shared);
        self.shared
            .registry
            .transition(task_id.as_str(), TaskState::InProgress);

        info!("Starting upload {} ({} -> {}/{})", task_id, local_path, bucket, key);
        match adapter.upload(PutObjectRequest::new(bucket, key, source), callbacks) {
            Ok(handle) => {
                if let Err(handle) = self.shared.registry.attach_handle(task_id.as_str(), handle) {
                    // Evicted before the handle arrived: either already
                    // finished or cancelled with nothing to signal yet.
                    debug!("Task {} left the registry during start", task_id);
                    handle.cancel();
                }
            }
            Err(e) => {
                warn!("Adapter refused upload {}: {}", task_id, e);
                self.shared
                    .finish(&task_id, TransferOutcome::Failed(e.to_string()));
            }
        }

        Ok(UploadFuture::new(task_id, completion))
    }

    fn subscribe_hooks(&self, task_id: &TaskId, options: UploadOptions) -> SubscriptionToken {
        self.shared
            .bus
            .subscribe(task_id.clone(), move |event| match &event.kind {
                ProgressEventKind::Progress { current, total } => {
                    if let Some(on_progress) = &options.on_progress {
                        on_progress(*current, *total, &event.task_id);
                    }
                }
                ProgressEventKind::Failed { error } => {
                    if let Some(on_failed) = &options.on_failed {
                        on_failed(&event.task_id, error);
                    }
                }
                ProgressEventKind::Cancelled => {
                    if let Some(on_cancel) = &options.on_cancel {
                        on_cancel(&event.task_id);
                    }
                }
                ProgressEventKind::Completed => {}
            })
    }
}

impl CoordinatorShared {
    /// Apply the terminal outcome to an evicted entry and settle its caller
    pub(crate) fn conclude(&self, entry: TaskEntry, outcome: TransferOutcome) {
        let TaskEntry {
            mut task,
            handle,
            completion,
            subscription,
        } = entry;
        let task_id = task.id.clone();

        let (state, event, result) = match outcome {
            TransferOutcome::Completed(body) => (
                TaskState::Completed,
                ProgressEvent::completed(task_id.clone()),
                Ok(UploadResult {
                    result: body,
                    upload_id: task_id.clone(),
                }),
            ),
            TransferOutcome::Failed(error) => (
                TaskState::Failed,
                ProgressEvent::failed(task_id.clone(), error.clone()),
                Err(UploadError::upload_failed(task_id.as_str(), error)),
            ),
            TransferOutcome::Cancelled => (
                TaskState::Cancelled,
                ProgressEvent::cancelled(task_id.clone()),
                Err(UploadError::cancelled(task_id.as_str())),
            ),
        };

        // Drained by cancel_all between registration and adapter start
        if task.state == TaskState::Pending {
            task.transition(TaskState::InProgress);
        }
        if !task.transition(state) {
            warn!("Task {} cannot move from {} to {}", task_id, task.state, state);
        }
        match &result {
            Ok(_) => info!("Upload {} completed", task_id),
            Err(e) => info!("Upload {} ended: {}", task_id, e),
        }
        drop(handle);

        // Settle right after the terminal event so callers awaiting the
        // future have already seen every hook invocation for this task.
        let bus = self.bus.clone();
        self.bus.publish_then(
            event,
            Box::new(move || {
                if let Some(token) = subscription {
                    bus.unsubscribe(token);
                }
                completion.settle(result);
            }),
        );
    }
}

impl Drop for CoordinatorShared {
    /// Abort whatever is still running once the last coordinator handle goes.
    ///
    /// Callbacks only hold a weak reference, so nothing could settle these
    /// futures afterwards. Settlement is direct: the delivery context may be
    /// shutting down with us.
    fn drop(&mut self) {
        let entries = self.registry.cancel_all();
        if entries.is_empty() {
            return;
        }

        warn!(
            "Coordinator dropped with {} upload(s) in flight, cancelling",
            entries.len()
        );
        for entry in entries {
            if let Some(token) = entry.subscription {
                self.bus.unsubscribe(token);
            }
            entry
                .completion
                .settle(Err(UploadError::cancelled(entry.task.id.as_str())));
        }
    }
}

impl TransferSink for CoordinatorShared {
    fn progress(&self, task_id: &TaskId, current: u64, total: u64) {
        let Some(completion) = self.registry.record_progress(task_id.as_str(), current, total)
        else {
            debug!("Dropping stray progress for {}", task_id);
            return;
        };

        // Re-checked on the delivery context. The terminal event and the
        // settlement are delivered as one job, so progress queued before it
        // still arrives and progress queued behind it is dropped.
        self.bus.publish_if(
            ProgressEvent::progress(task_id.clone(), current, total),
            move |_| !completion.is_settled(),
        );
    }

    fn finish(&self, task_id: &TaskId, outcome: TransferOutcome) {
        match self.registry.remove(task_id.as_str()) {
            Some(entry) => self.conclude(entry, outcome),
            None => debug!("Dropping stray {:?} outcome for {}", outcome, task_id),
        }
    }
}
