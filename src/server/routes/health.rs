//! Health check endpoint

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::server::state::AppState;
use crate::server::types::HealthResponse;

/// GET /api/health - Liveness plus what the server was started with
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        assistant_id: state.services.assistant_id.clone(),
        prompts: state.services.prompts.len(),
    })
}
