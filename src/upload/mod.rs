//! Upload coordination
//!
//! This module provides the coordinator that starts, tracks and cancels
//! uploads, together with the per-upload options and results.

pub mod cancel;
pub mod coordinator;
pub mod lifecycle;
pub mod source;
pub mod types;

pub use coordinator::UploadCoordinator;
pub use lifecycle::HostLifecycleEvent;
pub use source::resolve_local_path;
pub use types::{
    CancelCallback, FailedCallback, ProgressCallback, UploadOptions, UploadProgress, UploadResult,
};
