//! Stored conversation endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::error::StoreError;
use crate::persistence::{ConversationLog, ConversationSummary};
use crate::server::state::AppState;
use crate::server::types::{store_error, ApiError};

/// GET /api/conversations - History panel, most recently written first
pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<ConversationSummary>> {
    Json(state.services.store.list_all().await)
}

/// GET /api/conversations/:id
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Result<Json<ConversationLog>, ApiError> {
    state
        .services
        .store
        .load(&conversation_id)
        .await
        .map(Json)
        .map_err(|e| store_error(&e))
}

/// DELETE /api/conversations/:id
pub async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    match state.services.store.delete(&conversation_id).await {
        Ok(true) => Ok(StatusCode::NO_CONTENT),
        Ok(false) => Err(store_error(&StoreError::NotFound(conversation_id))),
        Err(e) => {
            tracing::error!("Failed to delete conversation {}: {}", conversation_id, e);
            Err(store_error(&e))
        }
    }
}
