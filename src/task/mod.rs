//! Upload task identity, lifecycle state and the task registry

pub mod registry;
pub mod types;

pub use registry::{TaskEntry, TaskRegistry};
pub use types::{TaskId, TaskState, UploadTask};
