//! Local filesystem storage backend
//!
//! Stores objects as `<root>/<bucket>/<key>`. The source is streamed in
//! chunks on a tokio task; cumulative progress is reported after each chunk
//! is written and cancellation is honoured between chunks. Data lands in a
//! `.part` file private to the transfer and is renamed into place only on
//! success, so concurrent uploads to one key never share a temp file.

use crate::adapter::types::{PutObjectRequest, StorageAdapter, TransferHandle, TransferOutcome};
use crate::callback::TransferCallbacks;
use crate::client::ClientConfig;
use crate::error::{Result, UploadError};
use bytesize::ByteSize;
use log::{debug, warn};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Adapter writing objects under a root directory
#[derive(Debug, Clone)]
pub struct LocalFsAdapter {
    root: PathBuf,
    chunk_size: usize,
    chunk_delay: Option<Duration>,
    runtime: tokio::runtime::Handle,
}

impl LocalFsAdapter {
    /// Create an adapter that runs transfers on the caller's tokio runtime
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            UploadError::config_error(format!("local adapter needs a tokio runtime: {}", e))
        })?;
        Ok(Self::with_runtime(root, runtime))
    }

    pub fn with_runtime(root: impl Into<PathBuf>, runtime: tokio::runtime::Handle) -> Self {
        Self {
            root: root.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_delay: None,
            runtime,
        }
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Pause after each chunk, to make transfers observable in demos
    pub fn chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Destination path for an object, rejecting keys that escape the bucket
    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        fn plain(segment: &str) -> bool {
            !segment.is_empty()
                && Path::new(segment)
                    .components()
                    .all(|c| matches!(c, Component::Normal(_)))
        }

        if !plain(bucket) || bucket.contains('/') {
            return Err(UploadError::config_error(format!(
                "invalid bucket name: {}",
                bucket
            )));
        }
        if !plain(key.trim_start_matches('/')) {
            return Err(UploadError::config_error(format!(
                "invalid object key: {}",
                key
            )));
        }

        Ok(self.root.join(bucket).join(key.trim_start_matches('/')))
    }
}

struct LocalTransfer {
    token: CancellationToken,
}

impl TransferHandle for LocalTransfer {
    fn cancel(&self) {
        self.token.cancel();
    }
}

impl StorageAdapter for LocalFsAdapter {
    fn upload(
        &self,
        request: PutObjectRequest,
        callbacks: TransferCallbacks,
    ) -> Result<Arc<dyn TransferHandle>> {
        let destination = self.object_path(&request.bucket, &request.key)?;
        let partial = partial_path(&destination);
        let token = CancellationToken::new();

        let transfer = Transfer {
            source: request.local_path,
            destination,
            partial,
            chunk_size: self.chunk_size,
            chunk_delay: self.chunk_delay,
            token: token.clone(),
        };

        self.runtime.spawn(async move {
            let outcome = match transfer.run(&callbacks).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    discard(&transfer.partial).await;
                    TransferOutcome::Failed(e.to_string())
                }
            };
            callbacks.on_complete(outcome);
        });

        Ok(Arc::new(LocalTransfer { token }))
    }
}

struct Transfer {
    source: PathBuf,
    destination: PathBuf,
    partial: PathBuf,
    chunk_size: usize,
    chunk_delay: Option<Duration>,
    token: CancellationToken,
}

impl Transfer {
    async fn run(&self, callbacks: &TransferCallbacks) -> Result<TransferOutcome> {
        let mut source = tokio::fs::File::open(&self.source).await?;
        let total = source.metadata().await?.len();

        if let Some(parent) = self.destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = &self.partial;
        let mut sink = tokio::fs::File::create(partial).await?;

        let mut buffer = vec![0u8; self.chunk_size];
        let mut sent: u64 = 0;

        loop {
            if self.token.is_cancelled() {
                drop(sink);
                discard(partial).await;
                debug!(
                    "Local transfer to {} cancelled after {}",
                    self.destination.display(),
                    ByteSize::b(sent)
                );
                return Ok(TransferOutcome::Cancelled);
            }

            let n = source.read(&mut buffer).await?;
            if n == 0 {
                break;
            }
            sink.write_all(&buffer[..n]).await?;
            sent += n as u64;
            callbacks.on_progress(sent, total.max(sent));

            if let Some(delay) = self.chunk_delay {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = self.token.cancelled() => {}
                }
            }
        }

        sink.flush().await?;
        sink.sync_all().await?;
        drop(sink);
        tokio::fs::rename(partial, &self.destination).await?;

        debug!(
            "Stored {} at {}",
            ByteSize::b(sent),
            self.destination.display()
        );
        Ok(TransferOutcome::Completed("OK".to_string()))
    }
}

/// `<destination>.<random>.part`, unique per transfer
fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(format!(".{}.part", Uuid::new_v4().simple()));
    PathBuf::from(name)
}

async fn discard(partial: &Path) {
    match tokio::fs::remove_file(partial).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial upload {}: {}", partial.display(), e),
    }
}

/// Connector mapping a `file:///dir` endpoint to a [`LocalFsAdapter`] rooted there
#[derive(Debug, Clone, Default)]
pub struct LocalFsConnector {
    chunk_size: Option<usize>,
    chunk_delay: Option<Duration>,
}

impl LocalFsConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size);
        self
    }

    pub fn chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }
}

impl crate::client::AdapterConnector for LocalFsConnector {
    fn connect(&self, config: &ClientConfig) -> Result<Arc<dyn StorageAdapter>> {
        let url = config.endpoint_url()?;
        if url.scheme() != "file" {
            return Err(UploadError::init_error(format!(
                "local backend needs a file:// endpoint, got {}",
                config.endpoint
            )));
        }
        let root = url
            .to_file_path()
            .map_err(|_| UploadError::init_error(format!("invalid root: {}", config.endpoint)))?;

        std::fs::create_dir_all(&root)?;

        let mut adapter = LocalFsAdapter::new(root)?;
        if let Some(size) = self.chunk_size {
            adapter = adapter.chunk_size(size);
        }
        if let Some(delay) = self.chunk_delay {
            adapter = adapter.chunk_delay(delay);
        }
        Ok(Arc::new(adapter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_object_path() {
        let adapter = LocalFsAdapter::new("/srv/objects").unwrap();

        assert_eq!(
            adapter.object_path("bucket-a", "dir/k1").unwrap(),
            PathBuf::from("/srv/objects/bucket-a/dir/k1")
        );
        assert_eq!(
            adapter.object_path("bucket-a", "/k1").unwrap(),
            PathBuf::from("/srv/objects/bucket-a/k1")
        );
        assert!(adapter.object_path("bucket-a", "../escape").is_err());
        assert!(adapter.object_path("..", "k1").is_err());
        assert!(adapter.object_path("a/b", "k1").is_err());
        assert!(adapter.object_path("bucket-a", "").is_err());
    }

    #[test]
    fn test_adapter_requires_runtime() {
        assert!(LocalFsAdapter::new("/srv/objects").is_err());
    }

    #[test]
    fn test_partial_path_is_unique_per_transfer() {
        let first = partial_path(Path::new("/srv/b/k.bin"));
        let second = partial_path(Path::new("/srv/b/k.bin"));

        assert_ne!(first, second);
        for partial in [&first, &second] {
            assert_eq!(partial.parent(), Some(Path::new("/srv/b")));
            let name = partial.file_name().unwrap().to_str().unwrap();
            assert!(name.starts_with("k.bin.") && name.ends_with(".part"), "{}", name);
        }
    }
}
