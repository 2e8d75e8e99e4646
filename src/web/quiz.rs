use anyhow::anyhow;
use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
};
use tokio::task;
use tracing::{info, warn};

use crate::web::{AppState, RequestError, StagedFile, UploadSuccess, stage_upload};

/// `POST /upload`: stage the document, turn it into a quiz, and always remove
/// the staged copy before answering.
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadSuccess>, RequestError> {
    let multipart = multipart.map_err(|rejection| {
        warn!(%rejection, "upload is not a multipart body");
        RequestError::NoFile
    })?;

    let staged = stage_upload(multipart, state.config()).await?;

    // Detached so a client disconnect does not abort extraction or generation;
    // the staged file is released when the task finishes either way.
    let worker = tokio::spawn(process_staged(state, staged));
    let outcome = worker
        .await
        .map_err(|err| anyhow!("upload processing task failed: {err}"))?;

    outcome.map(Json)
}

async fn process_staged(
    state: AppState,
    staged: StagedFile,
) -> Result<UploadSuccess, RequestError> {
    info!(
        file = staged.original_name(),
        bytes = staged.file_size(),
        "extracting text"
    );

    let extractor = state.extractor();
    let path = staged.path().to_path_buf();
    let text = task::spawn_blocking(move || extractor.extract(&path))
        .await
        .map_err(|err| anyhow!("text extraction task failed: {err}"))??;

    if text.trim().chars().count() < state.config().min_text_chars {
        return Err(RequestError::InsufficientText);
    }

    info!(chars = text.len(), "generating questions from extracted text");
    let questions = state.generator().generate(&text).await?;

    staged.release();

    let response = UploadSuccess::new(questions);
    info!(
        sections = response.questions.total_sections,
        total_questions = response.total_questions,
        "quiz generated"
    );
    Ok(response)
}
