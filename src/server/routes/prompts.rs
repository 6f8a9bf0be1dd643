//! Prompt library endpoint

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::prompts::PromptDefinition;
use crate::server::state::AppState;

/// GET /api/prompts
pub async fn list_prompts(State(state): State<Arc<AppState>>) -> Json<Vec<PromptDefinition>> {
    Json(state.services.prompts.iter().cloned().collect())
}
