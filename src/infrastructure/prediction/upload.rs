//! Staging of uploaded images on local disk

use std::path::{Path, PathBuf};

use bytes::Bytes;
use rand::Rng;

use crate::domain::DomainError;

const MAX_EXTENSION_LENGTH: usize = 10;

/// Writes uploads into a directory under unique names
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist an upload; the file is removed when the returned guard drops
    pub async fn save(
        &self,
        file_name: Option<&str>,
        content_type: Option<&str>,
        data: Bytes,
    ) -> Result<StagedUpload, DomainError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            DomainError::storage(format!(
                "Failed to create upload directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let path = self.dir.join(staged_file_name(file_name, content_type));
        let staged = StagedUpload { path };

        tokio::fs::write(&staged.path, &data).await.map_err(|e| {
            DomainError::storage(format!("Failed to write upload: {}", e))
        })?;

        tracing::debug!(path = %staged.path.display(), bytes = data.len(), "Upload staged");
        Ok(staged)
    }
}

/// `image-<millis>-<random>.<ext>`
fn staged_file_name(file_name: Option<&str>, content_type: Option<&str>) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let nonce: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    let ext = extension_for(file_name, content_type);

    format!("image-{}-{}.{}", millis, nonce, ext)
}

/// Extension from the client file name, else from the content type
fn extension_for(file_name: Option<&str>, content_type: Option<&str>) -> String {
    let from_name = file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LENGTH
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|ext| ext.to_ascii_lowercase());

    from_name
        .or_else(|| {
            content_type
                .and_then(mime_guess::get_mime_extensions_str)
                .and_then(|exts| exts.first())
                .map(|ext| ext.to_string())
        })
        .unwrap_or_else(|| "bin".to_string())
}

/// An uploaded file that is deleted when dropped
#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
}

impl StagedUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove upload")
            }
        }
    }
}
