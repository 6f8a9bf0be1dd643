//! Configuration and assistant info endpoints

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};

use crate::server::state::AppState;
use crate::server::types::{api_error, ApiError, AssistantResponse, ConfigResponse};

/// GET /api/config
pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<ConfigResponse> {
    let config = state.config.read().await;
    let services = &state.services;

    Json(ConfigResponse {
        assistant_id: services.assistant_id.clone(),
        vector_store_id: services.vector_store_id.clone(),
        title_model: services.title_model.clone(),
        use_fixed_structure: services.use_fixed_structure,
        polling_interval_ms: config.polling.interval_ms,
        polling_deadline_secs: config.polling.deadline_secs,
        capabilities: services.capabilities,
        usage_strategy: services.driver.usage_strategy(),
        file_strategy: services.file_strategy,
        pricing: services.pricing.clone(),
    })
}

/// GET /api/assistant - Remote assistant configuration
pub async fn get_assistant(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AssistantResponse>, ApiError> {
    let services = &state.services;

    match services.api.retrieve_assistant(&services.assistant_id).await {
        Ok(assistant) => Ok(Json(assistant.into())),
        Err(e) => {
            tracing::error!("Failed to retrieve assistant: {}", e);
            Err(api_error(StatusCode::BAD_GATEWAY, "REMOTE_ERROR", e.to_string()))
        }
    }
}
