//! Shared fixtures for the integration tests
//!
//! [`ScriptedAdapter`] starts no real transfer. It keeps the callbacks of
//! every upload it is asked to run so a test can report progress and
//! outcomes by hand, from whichever thread it likes.

#![allow(dead_code)]

use oss_upload::{
    ClientConfig, DispatchMode, ProgressEventBus, PutObjectRequest, Result, StorageAdapter,
    StorageClient, TransferCallbacks, TransferHandle, UploadCoordinator,
};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub struct ScriptedTransfer {
    pub request: PutObjectRequest,
    pub callbacks: TransferCallbacks,
    pub cancels: Arc<AtomicUsize>,
}

#[derive(Default)]
pub struct ScriptedAdapter {
    transfers: Mutex<Vec<Arc<ScriptedTransfer>>>,
}

struct ScriptedHandle(Arc<AtomicUsize>);

impl TransferHandle for ScriptedHandle {
    fn cancel(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl StorageAdapter for ScriptedAdapter {
    fn upload(
        &self,
        request: PutObjectRequest,
        callbacks: TransferCallbacks,
    ) -> Result<Arc<dyn TransferHandle>> {
        let cancels = Arc::new(AtomicUsize::new(0));
        self.transfers.lock().push(Arc::new(ScriptedTransfer {
            request,
            callbacks,
            cancels: cancels.clone(),
        }));
        Ok(Arc::new(ScriptedHandle(cancels)))
    }
}

impl ScriptedAdapter {
    pub fn transfer(&self, index: usize) -> Arc<ScriptedTransfer> {
        self.transfers.lock()[index].clone()
    }

    pub fn started(&self) -> usize {
        self.transfers.lock().len()
    }
}

pub fn valid_config() -> ClientConfig {
    ClientConfig::new("ak", "sk", "sts", "https://oss-cn-hangzhou.aliyuncs.com")
}

/// Client whose `init` always connects to `adapter`
pub fn scripted_client(adapter: Arc<ScriptedAdapter>) -> StorageClient {
    let adapter: Arc<dyn StorageAdapter> = adapter;
    StorageClient::new(
        move |_config: &ClientConfig| -> Result<Arc<dyn StorageAdapter>> { Ok(adapter.clone()) },
    )
}

/// Initialized coordinator delivering events on a queued context
pub fn coordinator(adapter: Arc<ScriptedAdapter>) -> UploadCoordinator {
    let _ = env_logger::builder().is_test(true).try_init();

    let client = scripted_client(adapter);
    client.init(valid_config()).expect("init should succeed");
    let bus = ProgressEventBus::new(
        DispatchMode::Queued
            .dispatcher()
            .expect("tests run inside a tokio runtime"),
    );
    UploadCoordinator::new(client, bus)
}

/// A temp file of `len` bytes
pub fn source_file(len: usize) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(&vec![7u8; len]).expect("Failed to write temp file");
    file.flush().expect("Failed to flush temp file");
    file
}

pub fn path_str(file: &tempfile::NamedTempFile) -> &str {
    file.path().to_str().expect("temp path is UTF-8")
}
