//! Session management endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::server::state::{AppState, SessionHandle};
use crate::server::types::{
    session_busy, session_error, session_not_found, ApiError, LoadConversationRequest,
    SaveResponse, SelectPromptRequest, SessionResponse, SessionSettingsRequest, SetTitleRequest,
};
use crate::session::SessionSnapshot;

pub(crate) async fn find_session(state: &AppState, session_id: &str) -> Result<SessionHandle, ApiError> {
    state
        .get_session(session_id)
        .await
        .ok_or_else(|| session_not_found(session_id))
}

/// POST /api/sessions - Create a new session
pub async fn create_session(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let (session_id, handle) = state.create_session().await;
    let session = handle.try_lock().ok_or_else(session_busy)?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            id: session_id,
            created_at: handle.created_at.to_rfc3339(),
            session: session.snapshot(),
        }),
    ))
}

/// GET /api/sessions/:id - Get session details
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let handle = find_session(&state, &session_id).await?;
    let session = handle.try_lock().ok_or_else(session_busy)?;

    Ok(Json(SessionResponse {
        id: session_id,
        created_at: handle.created_at.to_rfc3339(),
        session: session.snapshot(),
    }))
}

/// DELETE /api/sessions/:id - Delete a session
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.remove_session(&session_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(session_not_found(&session_id))
    }
}

/// POST /api/sessions/:id/new - Start a new conversation
pub async fn new_conversation(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let handle = find_session(&state, &session_id).await?;
    let mut session = handle.try_lock().ok_or_else(session_busy)?;

    session.new_conversation();
    Ok(Json(session.snapshot()))
}

/// PUT /api/sessions/:id/prompt - Select the active prompt
pub async fn select_prompt(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<SelectPromptRequest>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let handle = find_session(&state, &session_id).await?;
    let mut session = handle.try_lock().ok_or_else(session_busy)?;

    session
        .select_prompt(request.prompt_id.as_deref())
        .map_err(|e| session_error(&e))?;
    Ok(Json(session.snapshot()))
}

/// PUT /api/sessions/:id/settings - Fixed structure and web browsing toggles
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<SessionSettingsRequest>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let handle = find_session(&state, &session_id).await?;
    let mut session = handle.try_lock().ok_or_else(session_busy)?;

    if let Some(enabled) = request.use_fixed_structure {
        session.set_use_fixed_structure(enabled);
    }

    if let Some(enable) = request.enable_web_browsing {
        if let Err(e) = session.set_web_browsing(enable).await {
            tracing::error!("Failed to toggle web browsing: {}", e);
            return Err(session_error(&e));
        }
    }

    Ok(Json(session.snapshot()))
}

/// PUT /api/sessions/:id/title - Rename the conversation
pub async fn set_title(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<SetTitleRequest>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let handle = find_session(&state, &session_id).await?;
    let mut session = handle.try_lock().ok_or_else(session_busy)?;

    session.set_title(&request.title);
    Ok(Json(session.snapshot()))
}

/// POST /api/sessions/:id/save - Write the conversation log
pub async fn save_conversation(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SaveResponse>, ApiError> {
    let handle = find_session(&state, &session_id).await?;
    let mut session = handle.try_lock().ok_or_else(session_busy)?;

    let path = session.save().await.map_err(|e| session_error(&e))?;
    Ok(Json(SaveResponse {
        log_id: session.state().log_id.clone(),
        title: session.state().conversation_title.clone(),
        path: path.display().to_string(),
    }))
}

/// POST /api/sessions/:id/load - Continue a stored conversation
pub async fn load_conversation(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<LoadConversationRequest>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let handle = find_session(&state, &session_id).await?;
    let mut session = handle.try_lock().ok_or_else(session_busy)?;

    session
        .load_conversation(&request.conversation_id)
        .await
        .map_err(|e| session_error(&e))?;
    Ok(Json(session.snapshot()))
}
