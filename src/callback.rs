//! Callback plumbing between storage adapters and callers
//!
//! Adapters report into a [`TransferCallbacks`] value, which forwards to the
//! coordinator by task id. Reports for ids the coordinator no longer knows
//! are dropped. Callers hold an [`UploadFuture`] backed by a [`Completion`]
//! slot that settles exactly once.

use crate::adapter::TransferOutcome;
use crate::error::Result;
use crate::task::TaskId;
use crate::upload::types::UploadResult;
use futures::task::AtomicWaker;
use log::trace;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

/// Receiver of adapter reports, keyed by task id
pub(crate) trait TransferSink: Send + Sync {
    fn progress(&self, task_id: &TaskId, current: u64, total: u64);
    fn finish(&self, task_id: &TaskId, outcome: TransferOutcome);
}

/// Reporting surface handed to a storage adapter for one transfer
///
/// Cheap to clone. Holds only a weak reference to the coordinator, so an
/// adapter keeping its callbacks alive never keeps the coordinator alive.
#[derive(Clone)]
pub struct TransferCallbacks {
    task_id: TaskId,
    sink: Weak<dyn TransferSink>,
}

impl TransferCallbacks {
    pub(crate) fn new(task_id: TaskId, sink: Weak<dyn TransferSink>) -> Self {
        Self { task_id, sink }
    }

    /// The task these callbacks report for
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Report cumulative bytes sent out of `total`
    pub fn on_progress(&self, current: u64, total: u64) {
        match self.sink.upgrade() {
            Some(sink) => sink.progress(&self.task_id, current, total),
            None => trace!("Coordinator gone, dropping progress for {}", self.task_id),
        }
    }

    /// Report the terminal outcome; later reports for this task are dropped
    pub fn on_complete(&self, outcome: TransferOutcome) {
        match self.sink.upgrade() {
            Some(sink) => sink.finish(&self.task_id, outcome),
            None => trace!("Coordinator gone, dropping outcome for {}", self.task_id),
        }
    }

    pub fn on_success(&self, body: impl Into<String>) {
        self.on_complete(TransferOutcome::Completed(body.into()));
    }

    pub fn on_failure(&self, error: impl Into<String>) {
        self.on_complete(TransferOutcome::Failed(error.into()));
    }

    pub fn on_cancelled(&self) {
        self.on_complete(TransferOutcome::Cancelled);
    }
}

impl std::fmt::Debug for TransferCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferCallbacks")
            .field("task_id", &self.task_id)
            .finish()
    }
}

/// Single-settlement result slot for one upload
pub(crate) struct Completion {
    result: Mutex<Option<Result<UploadResult>>>,
    settled: AtomicBool,
    waker: AtomicWaker,
}

impl Completion {
    pub fn new() -> Self {
        Self {
            result: Mutex::new(None),
            settled: AtomicBool::new(false),
            waker: AtomicWaker::new(),
        }
    }

    /// Store the result and wake the waiter; only the first call has effect
    pub fn settle(&self, result: Result<UploadResult>) -> bool {
        if self.settled.swap(true, Ordering::AcqRel) {
            return false;
        }
        *self.result.lock() = Some(result);
        self.waker.wake();
        true
    }

    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::Acquire)
    }

    fn poll_result(&self, cx: &mut Context<'_>) -> Poll<Result<UploadResult>> {
        self.waker.register(cx.waker());
        match self.result.lock().take() {
            Some(result) => Poll::Ready(result),
            None => Poll::Pending,
        }
    }
}

/// The caller's handle on a started upload
///
/// Resolves with the service's response once the upload completes, or with
/// `UploadFailed` / `UploadCancelled`. Dropping it does not cancel the upload.
pub struct UploadFuture {
    task_id: TaskId,
    completion: Arc<Completion>,
}

impl UploadFuture {
    pub(crate) fn new(task_id: TaskId, completion: Arc<Completion>) -> Self {
        Self {
            task_id,
            completion,
        }
    }

    /// Id of the task backing this upload, usable with `cancel_upload`
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn is_settled(&self) -> bool {
        self.completion.is_settled()
    }

    /// Block the current thread until the upload settles.
    ///
    /// Must not be called from the event delivery context or from inside an
    /// async runtime worker.
    pub fn wait(self) -> Result<UploadResult> {
        futures::executor::block_on(self)
    }
}

impl Future for UploadFuture {
    type Output = Result<UploadResult>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.completion.poll_result(cx)
    }
}

impl std::fmt::Debug for UploadFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadFuture")
            .field("task_id", &self.task_id)
            .field("settled", &self.is_settled())
            .finish()
    }
}
