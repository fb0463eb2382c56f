//! Storage client management
//!
//! This module provides the client configuration and the process-scoped
//! client state that the upload coordinator draws its adapter from.

pub mod config;
pub mod lifecycle;

pub use config::ClientConfig;
pub use lifecycle::{AdapterConnector, StorageClient};
