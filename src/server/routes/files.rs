//! File upload and document index endpoints

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};

use crate::llm::RemoteFile;
use crate::server::routes::sessions::find_session;
use crate::server::state::AppState;
use crate::server::types::{
    api_error, session_busy, session_error, ApiError, RemoveFileResponse,
};
use crate::session::{AssistantFiles, UploadedFile};

/// Largest upload accepted by the server
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// GET /api/files - Every file in the service account
pub async fn list_available_files(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<RemoteFile>>, ApiError> {
    state.services.available_files().await.map(Json).map_err(|e| {
        tracing::error!("Failed to list files: {}", e);
        session_error(&e)
    })
}

/// GET /api/sessions/:id/files - Uploaded files and the document index
pub async fn list_session_files(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<AssistantFiles>, ApiError> {
    let handle = find_session(&state, &session_id).await?;
    let mut session = handle.try_lock().ok_or_else(session_busy)?;

    session
        .assistant_files()
        .await
        .map(Json)
        .map_err(|e| session_error(&e))
}

/// POST /api/sessions/:id/files - Upload a file (multipart field `file`)
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadedFile>), ApiError> {
    let handle = find_session(&state, &session_id).await?;
    let mut session = handle.try_lock().ok_or_else(session_busy)?;

    let invalid = |e: axum::extract::multipart::MultipartError| {
        api_error(StatusCode::BAD_REQUEST, "INVALID_UPLOAD", e.to_string())
    };

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let content = field.bytes().await.map_err(invalid)?;
        upload = Some((filename, content.to_vec()));
        break;
    }

    let Some((filename, content)) = upload else {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "INVALID_UPLOAD",
            "Missing multipart field `file`",
        ));
    };

    tracing::debug!(filename = %filename, size_bytes = content.len(), "Received file upload");

    let uploaded = session.upload_file(&filename, content).await.map_err(|e| {
        tracing::error!("Failed to upload {}: {}", filename, e);
        session_error(&e)
    })?;

    Ok((StatusCode::CREATED, Json(uploaded)))
}

/// DELETE /api/sessions/:id/files/:file_id - Remove a file from the index
pub async fn remove_file(
    State(state): State<Arc<AppState>>,
    Path((session_id, file_id)): Path<(String, String)>,
) -> Result<Json<RemoveFileResponse>, ApiError> {
    let handle = find_session(&state, &session_id).await?;
    let mut session = handle.try_lock().ok_or_else(session_busy)?;

    let removed = session
        .remove_file(&file_id)
        .await
        .map_err(|e| session_error(&e))?;

    Ok(Json(RemoveFileResponse { file_id, removed }))
}
