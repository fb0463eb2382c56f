pub mod adapter;
pub mod callback;
pub mod client;
pub mod error;
pub mod events;
pub mod task;
pub mod upload;

pub use adapter::{
    LocalFsAdapter, LocalFsConnector, PutObjectRequest, StorageAdapter, TransferHandle,
    TransferOutcome,
};

pub use callback::{TransferCallbacks, UploadFuture};

pub use client::{AdapterConnector, ClientConfig, StorageClient};

pub use error::{Result, UploadError};

pub use events::{
    DispatchMode, EventDispatcher, InlineDispatcher, ProgressEvent, ProgressEventBus,
    ProgressEventKind, ProgressPayload, QueuedDispatcher, SubscriptionToken, PROGRESS_CHANNEL,
};

pub use task::{TaskId, TaskRegistry, TaskState, UploadTask};

pub use upload::{
    HostLifecycleEvent, UploadCoordinator, UploadOptions, UploadProgress, UploadResult,
};
