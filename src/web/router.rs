use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::{StatusCode, header},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::warn;

use crate::web::{ApiError, AppState, HealthStatus, RequestError, json_error, quiz};

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config().max_upload_bytes;

    Router::new()
        .route("/", get(index_page))
        .route("/upload", post(quiz::upload))
        .route("/health", get(health))
        // Oversized bodies are refused by the limit layer before any handler runs.
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(middleware::map_response(json_limit_rejection))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The limit layer answers with a plain-text 413; clients get the same JSON
/// error as every other upload failure.
async fn json_limit_rejection(response: Response) -> Response {
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .is_some_and(|value| value.as_bytes().starts_with(b"application/json"));

    if response.status() == StatusCode::PAYLOAD_TOO_LARGE && !is_json {
        return RequestError::PayloadTooLarge.into_response();
    }
    response
}

async fn index_page(
    State(state): State<AppState>,
) -> Result<Html<String>, (StatusCode, Json<ApiError>)> {
    let path = &state.config().index_path;
    tokio::fs::read_to_string(path).await.map(Html).map_err(|err| {
        warn!(?err, file = %path.display(), "landing page unavailable");
        json_error(StatusCode::NOT_FOUND, "Not found")
    })
}

async fn health() -> Json<HealthStatus> {
    Json(HealthStatus { status: "healthy" })
}
