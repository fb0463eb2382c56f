//! Storage adapter capability
//!
//! The coordinator never speaks an object-storage protocol itself. It hands
//! each upload to a [`StorageAdapter`] and keeps the returned
//! [`TransferHandle`] to request cancellation.

pub mod local;
pub mod types;

pub use local::{LocalFsAdapter, LocalFsConnector};
pub use types::{PutObjectRequest, StorageAdapter, TransferHandle, TransferOutcome};
