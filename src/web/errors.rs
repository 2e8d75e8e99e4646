use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use crate::{extract::ExtractError, quiz::GenerateError, web::json_error};

const INTERNAL_ERROR: &str = "internal server error";

/// Every way an upload request can fail, mapped to a status and a client-facing
/// message by [`IntoResponse`].
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("No file provided")]
    NoFile,
    #[error("No file selected")]
    NoFileSelected,
    #[error("Invalid file type. Please upload PDF or Word documents.")]
    InvalidFileType,
    #[error("File too large. Maximum upload size is 16 MB.")]
    PayloadTooLarge,
    #[error("Invalid upload: {0}")]
    MalformedUpload(String),
    #[error(
        "Could not extract sufficient text from the document. Please ensure the document contains readable text."
    )]
    InsufficientText,
    #[error("{0}")]
    Configuration(String),
    #[error(transparent)]
    Extraction(#[from] ExtractError),
    #[error(transparent)]
    Generation(GenerateError),
    #[error(transparent)]
    Unhandled(#[from] anyhow::Error),
}

impl RequestError {
    pub fn from_multipart(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            RequestError::PayloadTooLarge
        } else {
            RequestError::MalformedUpload(err.body_text())
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::NoFile
            | RequestError::NoFileSelected
            | RequestError::InvalidFileType
            | RequestError::MalformedUpload(_)
            | RequestError::InsufficientText => StatusCode::BAD_REQUEST,
            RequestError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            RequestError::Configuration(_)
            | RequestError::Extraction(_)
            | RequestError::Generation(_)
            | RequestError::Unhandled(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message sent to the client. Unexpected failures are prefixed so they
    /// read differently from configuration problems.
    ///
    /// Internal plumbing failures only get a generic description; their detail
    /// (paths, join errors) stays in the server log.
    pub fn client_message(&self) -> String {
        match self {
            RequestError::Extraction(_) | RequestError::Generation(_) => {
                format!("Error processing file: {self}")
            }
            RequestError::Unhandled(_) => format!("Error processing file: {INTERNAL_ERROR}"),
            other => other.to_string(),
        }
    }
}

impl From<GenerateError> for RequestError {
    fn from(err: GenerateError) -> Self {
        match err {
            GenerateError::Configuration(message) => RequestError::Configuration(message),
            other => RequestError::Generation(other),
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.client_message();

        if matches!(self, RequestError::Configuration(_)) {
            error!(detail = %message, "configuration error");
        } else if status.is_server_error() {
            // Debug on anyhow prints the whole source chain (and a backtrace when enabled).
            let report = anyhow::Error::new(self);
            error!(error = ?report, "error processing file");
        } else {
            warn!(%status, %message, "rejected upload");
        }

        json_error(status, message).into_response()
    }
}
