//! Plain-text extraction from uploaded documents.

mod word;

use std::{io, path::Path};

use pdf_extract::extract_text as extract_pdf_text;
use thiserror::Error;

use crate::config::file_extension;

/// Turns a staged document into plain text.
///
/// Implementations are synchronous and may be CPU heavy; callers run them on
/// the blocking pool.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Unsupported file type: {0}")]
    Unsupported(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to extract PDF text: {0}")]
    Pdf(String),
    #[error("invalid DOCX archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("failed to parse DOCX XML: {0}")]
    Xml(String),
    #[error("unreadable Word document: {0}")]
    LegacyDoc(&'static str),
}

impl ExtractError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            source,
        }
    }
}

/// Extractor for the formats the upload endpoint accepts, chosen by extension.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentExtractor;

impl TextExtractor for DocumentExtractor {
    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let extension = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(file_extension)
            .unwrap_or_default();

        let content = match extension.as_str() {
            "pdf" => extract_pdf_text(path).map_err(|err| ExtractError::Pdf(err.to_string()))?,
            "docx" => word::extract_docx_text(path)?,
            "doc" => word::extract_doc_text(path)?,
            other => return Err(ExtractError::Unsupported(other.to_string())),
        };

        Ok(content.trim().to_string())
    }
}
