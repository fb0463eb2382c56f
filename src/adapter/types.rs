use crate::callback::TransferCallbacks;
use crate::error::Result;
use std::path::PathBuf;
use std::sync::Arc;

/// A single-object PUT handed to a storage adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObjectRequest {
    pub bucket: String,
    pub key: String,
    pub local_path: PathBuf,
}

impl PutObjectRequest {
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        local_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            local_path: local_path.into(),
        }
    }
}

/// How a transfer ended, as reported by the adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The object was stored; carries the service's response body
    Completed(String),
    /// Transport or service error, passed through verbatim
    Failed(String),
    /// The adapter aborted the transfer
    Cancelled,
}

/// Cancel capability for one running transfer
///
/// `cancel` must not block on the transfer actually stopping, and must be a
/// no-op for a transfer that already finished.
pub trait TransferHandle: Send + Sync {
    fn cancel(&self);
}

/// An object-storage client able to run single-file uploads
///
/// `upload` starts the transfer and returns immediately. Progress and the
/// terminal outcome are reported through `callbacks`, from any thread.
pub trait StorageAdapter: Send + Sync {
    fn upload(
        &self,
        request: PutObjectRequest,
        callbacks: TransferCallbacks,
    ) -> Result<Arc<dyn TransferHandle>>;
}
