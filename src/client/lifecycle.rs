//! Storage client lifecycle
//!
//! [`StorageClient`] is the process-scoped slot holding the configured
//! storage adapter. It is created once, injected into the coordinator, and
//! moves between "not initialized" and "initialized" through
//! [`init`](StorageClient::init) and [`reset`](StorageClient::reset).

use crate::adapter::StorageAdapter;
use crate::client::config::ClientConfig;
use crate::error::{Result, UploadError};
use chrono::{DateTime, Utc};
use log::{info, warn};
use parking_lot::RwLock;
use std::sync::Arc;

/// Builds a storage adapter from validated client configuration
pub trait AdapterConnector: Send + Sync {
    fn connect(&self, config: &ClientConfig) -> Result<Arc<dyn StorageAdapter>>;
}

impl<F> AdapterConnector for F
where
    F: Fn(&ClientConfig) -> Result<Arc<dyn StorageAdapter>> + Send + Sync,
{
    fn connect(&self, config: &ClientConfig) -> Result<Arc<dyn StorageAdapter>> {
        self(config)
    }
}

struct ConfiguredAdapter {
    adapter: Arc<dyn StorageAdapter>,
    endpoint: String,
    initialized_at: DateTime<Utc>,
}

struct ClientInner {
    connector: Arc<dyn AdapterConnector>,
    configured: RwLock<Option<ConfiguredAdapter>>,
}

/// Shared handle on the process's storage client state
#[derive(Clone)]
pub struct StorageClient {
    inner: Arc<ClientInner>,
}

impl StorageClient {
    /// Create an uninitialized client that will connect through `connector`
    pub fn new(connector: impl AdapterConnector + 'static) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                connector: Arc::new(connector),
                configured: RwLock::new(None),
            }),
        }
    }

    /// Configure the client, replacing any previous configuration.
    ///
    /// Uploads already running keep the adapter they started with.
    pub fn init(&self, config: ClientConfig) -> Result<bool> {
        config.validate()?;

        let adapter = self.inner.connector.connect(&config).map_err(|e| match e {
            UploadError::InitError { .. } => e,
            other => UploadError::init_error(other.to_string()),
        })?;

        let previous = self.inner.configured.write().replace(ConfiguredAdapter {
            adapter,
            endpoint: config.endpoint.clone(),
            initialized_at: Utc::now(),
        });

        if previous.is_some() {
            warn!("Storage client re-initialized for {}", config.endpoint);
        } else {
            info!("Storage client initialized for {}", config.endpoint);
        }
        Ok(true)
    }

    /// Drop the configured adapter; new uploads fail until `init` is called again
    pub fn reset(&self) {
        if self.inner.configured.write().take().is_some() {
            info!("Storage client reset");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.configured.read().is_some()
    }

    /// The configured adapter, or `NotInitialized`
    pub fn adapter(&self) -> Result<Arc<dyn StorageAdapter>> {
        self.inner
            .configured
            .read()
            .as_ref()
            .map(|configured| configured.adapter.clone())
            .ok_or(UploadError::NotInitialized)
    }

    pub fn endpoint(&self) -> Option<String> {
        self.inner
            .configured
            .read()
            .as_ref()
            .map(|configured| configured.endpoint.clone())
    }

    pub fn initialized_at(&self) -> Option<DateTime<Utc>> {
        self.inner
            .configured
            .read()
            .as_ref()
            .map(|configured| configured.initialized_at)
    }
}

impl std::fmt::Debug for StorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageClient")
            .field("endpoint", &self.endpoint())
            .finish()
    }
}
