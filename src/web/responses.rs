use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;

use crate::quiz::QuestionSet;

/// Canonical JSON payload for error responses.
#[derive(Debug, Serialize, Clone)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Body of a successful `POST /upload`.
#[derive(Debug, Serialize, Clone)]
pub struct UploadSuccess {
    pub success: bool,
    pub questions: QuestionSet,
    pub total_questions: usize,
}

impl UploadSuccess {
    pub fn new(questions: QuestionSet) -> Self {
        Self {
            success: true,
            total_questions: questions.total_questions(),
            questions,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: &'static str,
}

/// Helper for controllers that need to return `(StatusCode, Json<ApiError>)`.
pub fn json_error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (status, Json(ApiError::new(message)))
}
