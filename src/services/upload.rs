//! Saving uploaded files into the upload directory.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::error::UploadError;
use crate::models::StorageConfig;
use crate::utils::sanitize_filename;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadOutcome {
    Saved { filename: String, path: PathBuf },
    /// A file with this name exists; the upload was discarded.
    AlreadyExists { filename: String },
}

impl UploadOutcome {
    pub fn filename(&self) -> &str {
        match self {
            UploadOutcome::Saved { filename, .. } | UploadOutcome::AlreadyExists { filename } => {
                filename
            }
        }
    }
}

/// Write `bytes` to the upload directory under a sanitized `original_name`.
///
/// Creation is atomic: an existing file is never overwritten, even by a
/// concurrent upload of the same name.
pub async fn save_upload(
    storage: &StorageConfig,
    original_name: &str,
    bytes: &[u8],
) -> Result<UploadOutcome, UploadError> {
    let filename = sanitize_filename(original_name);
    if filename.is_empty() {
        return Err(UploadError::InvalidFilename(original_name.to_string()));
    }
    if !storage.is_allowed(&filename) {
        return Err(UploadError::NotAllowed(format!(
            "{} (allowed: {})",
            filename,
            storage.extensions.join(", ")
        )));
    }

    tokio::fs::create_dir_all(&storage.upload_dir).await?;
    let path = storage.upload_dir.join(&filename);

    let mut file = match tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .await
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            tracing::info!(file = %filename, "upload already exists, skipping");
            return Ok(UploadOutcome::AlreadyExists { filename });
        }
        Err(e) => return Err(e.into()),
    };

    if let Err(e) = write_all(&mut file, bytes).await {
        drop(file);
        remove_partial(&path).await;
        return Err(e.into());
    }

    tracing::info!(file = %filename, bytes = bytes.len(), "saved upload");
    Ok(UploadOutcome::Saved { filename, path })
}

async fn write_all(file: &mut tokio::fs::File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.sync_all().await
}

async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove partial upload");
    }
}
