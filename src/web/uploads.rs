use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use axum::extract::Multipart;
use sanitize_filename::sanitize;
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    config::{AppConfig, file_extension},
    web::RequestError,
};

/// Multipart field carrying the document.
pub const FILE_FIELD: &str = "file";
const MAX_STEM_CHARS: usize = 120;
const FALLBACK_STEM: &str = "upload";

/// Ensures the staging directory exists.
pub async fn ensure_upload_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .with_context(|| format!("failed to ensure upload directory at {}", path.display()))
}

/// An upload written to the staging directory. The file is removed when the
/// guard is dropped, so it cannot outlive the request that created it.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    original_name: String,
    file_size: u64,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Deletes the staged file if it is still present. Safe to call repeatedly.
    pub fn release(&self) {
        if !self.path.exists() {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(file = %self.path.display(), "released staged upload"),
            Err(err) => warn!(?err, file = %self.path.display(), "failed to remove staged upload"),
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        self.release();
    }
}

/// Reads the multipart body until the `file` field, validates it and writes it
/// into the staging directory.
///
/// Every validation failure is returned before anything touches the disk.
pub async fn stage_upload(
    mut multipart: Multipart,
    config: &AppConfig,
) -> Result<StagedFile, RequestError> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(RequestError::from_multipart)?
    {
        // A `file` part without a filename attribute is a plain form value.
        let Some(original_name) = field
            .file_name()
            .filter(|_| field.name() == Some(FILE_FIELD))
            .map(str::to_string)
        else {
            continue;
        };
        if original_name.is_empty() {
            return Err(RequestError::NoFileSelected);
        }
        if !config.is_allowed_file(&original_name) {
            return Err(RequestError::InvalidFileType);
        }

        let path = config
            .upload_dir
            .join(staging_name(Uuid::new_v4(), &original_name));
        let mut file = File::create(&path)
            .await
            .with_context(|| format!("failed to create {}", path.display()))?;

        let mut staged = StagedFile {
            path,
            original_name,
            file_size: 0,
        };

        while let Some(chunk) = field.chunk().await.map_err(RequestError::from_multipart)? {
            staged.file_size += chunk.len() as u64;
            file.write_all(&chunk)
                .await
                .context("failed to write staged upload")?;
        }
        file.flush()
            .await
            .context("failed to flush staged upload")?;

        return Ok(staged);
    }

    Err(RequestError::NoFile)
}

/// On-disk name for an upload: a request-scoped id, the sanitized stem and the
/// lowercased extension, so concurrent uploads of the same file never collide.
pub fn staging_name(id: Uuid, original: &str) -> String {
    let extension = file_extension(original).unwrap_or_default();
    let stem = original
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(original);

    let mut stem: String = sanitize(stem).chars().take(MAX_STEM_CHARS).collect();
    if stem.trim_matches(|c: char| c == '.' || c.is_whitespace()).is_empty() {
        stem = FALLBACK_STEM.to_string();
    }

    format!("{}_{}.{}", id.simple(), stem, extension)
}
