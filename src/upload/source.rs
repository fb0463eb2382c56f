//! Local source resolution

use crate::error::{Result, UploadError};
use std::path::PathBuf;
use url::Url;

/// Resolve a plain path or `file://` URL to a readable regular file
pub fn resolve_local_path(local_path: &str) -> Result<PathBuf> {
    if local_path.trim().is_empty() {
        return Err(UploadError::invalid_local_path(local_path, "path is empty"));
    }

    let path = if local_path.starts_with("file://") {
        let url = Url::parse(local_path)
            .map_err(|e| UploadError::invalid_local_path(local_path, e.to_string()))?;
        url.to_file_path()
            .map_err(|_| UploadError::invalid_local_path(local_path, "not a local file URL"))?
    } else {
        PathBuf::from(local_path)
    };

    let metadata = std::fs::metadata(&path)
        .map_err(|e| UploadError::invalid_local_path(local_path, e.to_string()))?;
    if !metadata.is_file() {
        return Err(UploadError::invalid_local_path(local_path, "not a regular file"));
    }

    std::fs::File::open(&path)
        .map_err(|e| UploadError::invalid_local_path(local_path, e.to_string()))?;

    Ok(path)
}
