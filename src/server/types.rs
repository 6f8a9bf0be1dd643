//! Server types and DTOs
//!
//! This module defines the types used for API requests, responses,
//! and server-sent events.

use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::config::PricingConfig;
use crate::error::{RunError, SessionError, StoreError};
use crate::llm::{Assistant, Capabilities, FileAttachStrategy, UsageStrategy, WEB_BROWSING_TOOL};
use crate::run::RunEvent;
use crate::session::SessionSnapshot;

/// Server-sent event types for real-time updates
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// A turn started
    Connected,

    /// Waiting on the assistant
    Thinking { message: String },

    /// Run status after a poll
    RunPolled { status: String },

    /// Placeholder outputs were sent for pending tool calls
    ToolOutputsSubmitted { count: usize },

    /// The service reported a run status we do not recognise
    UnknownRunStatus { status: String },

    /// The assistant's answer
    Reply { text: String },

    /// Conversation token counters after the turn
    TokenUsage {
        input_tokens: u64,
        output_tokens: u64,
        total_tokens: u64,
    },

    TitleGenerated { title: String },

    /// Conversation log written
    Saved { path: String },

    /// Error occurred
    Error { message: String },

    /// Turn finished (no more events)
    Completed,
}

impl ServerEvent {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connected => "Connected",
            ServerEvent::Thinking { .. } => "Thinking",
            ServerEvent::RunPolled { .. } => "RunPolled",
            ServerEvent::ToolOutputsSubmitted { .. } => "ToolOutputsSubmitted",
            ServerEvent::UnknownRunStatus { .. } => "UnknownRunStatus",
            ServerEvent::Reply { .. } => "Reply",
            ServerEvent::TokenUsage { .. } => "TokenUsage",
            ServerEvent::TitleGenerated { .. } => "TitleGenerated",
            ServerEvent::Saved { .. } => "Saved",
            ServerEvent::Error { .. } => "Error",
            ServerEvent::Completed => "Completed",
        }
    }
}

/// Convert RunEvent to ServerEvent
impl From<RunEvent> for ServerEvent {
    fn from(event: RunEvent) -> Self {
        match event {
            RunEvent::Polled { status } => ServerEvent::RunPolled { status },
            RunEvent::ToolOutputsSubmitted { count } => ServerEvent::ToolOutputsSubmitted { count },
            RunEvent::UnknownStatus { status } => ServerEvent::UnknownRunStatus { status },
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub assistant_id: String,
    pub prompts: usize,
}

/// Configuration response
#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub assistant_id: String,
    pub vector_store_id: String,
    pub title_model: String,
    pub use_fixed_structure: bool,
    pub polling_interval_ms: u64,
    pub polling_deadline_secs: u64,
    pub capabilities: Capabilities,
    pub usage_strategy: UsageStrategy,
    pub file_strategy: FileAttachStrategy,
    pub pricing: PricingConfig,
}

/// Assistant info panel
#[derive(Debug, Serialize)]
pub struct AssistantResponse {
    pub id: String,
    pub name: Option<String>,
    pub model: String,
    pub tools: Vec<String>,
    pub web_browsing: bool,
}

impl From<Assistant> for AssistantResponse {
    fn from(assistant: Assistant) -> Self {
        let web_browsing = assistant.has_tool(WEB_BROWSING_TOOL);
        Self {
            tools: assistant.tools.iter().map(|t| t.kind.clone()).collect(),
            id: assistant.id,
            name: assistant.name,
            model: assistant.model,
            web_browsing,
        }
    }
}

/// Session response
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: String,
    pub created_at: String,
    pub session: SessionSnapshot,
}

/// Request to send a message
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

/// Request to select (or clear) the active prompt
#[derive(Debug, Deserialize)]
pub struct SelectPromptRequest {
    #[serde(default)]
    pub prompt_id: Option<String>,
}

/// Request to change session toggles; absent fields are left alone
#[derive(Debug, Default, Deserialize)]
pub struct SessionSettingsRequest {
    #[serde(default)]
    pub use_fixed_structure: Option<bool>,
    #[serde(default)]
    pub enable_web_browsing: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SetTitleRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct LoadConversationRequest {
    pub conversation_id: String,
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub log_id: Option<String>,
    pub title: Option<String>,
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct RemoveFileResponse {
    pub file_id: String,
    /// False when the file has to be removed in the service dashboard
    pub removed: bool,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Handler error: status plus JSON body
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.to_string(),
        }),
    )
}

pub fn session_not_found(session_id: &str) -> ApiError {
    api_error(
        StatusCode::NOT_FOUND,
        "SESSION_NOT_FOUND",
        format!("Session not found: {}", session_id),
    )
}

pub fn session_busy() -> ApiError {
    api_error(
        StatusCode::CONFLICT,
        "SESSION_BUSY",
        "Session is already processing a message",
    )
}

pub fn store_error(e: &StoreError) -> ApiError {
    match e {
        StoreError::EmptyHistory => api_error(StatusCode::BAD_REQUEST, "EMPTY_HISTORY", e.to_string()),
        StoreError::NotFound(_) => {
            api_error(StatusCode::NOT_FOUND, "CONVERSATION_NOT_FOUND", e.to_string())
        }
        _ => api_error(StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", e.to_string()),
    }
}

pub fn session_error(e: &SessionError) -> ApiError {
    match e {
        SessionError::EmptyMessage => api_error(StatusCode::BAD_REQUEST, "EMPTY_MESSAGE", e.to_string()),
        SessionError::UnknownPrompt(_) => {
            api_error(StatusCode::NOT_FOUND, "PROMPT_NOT_FOUND", e.to_string())
        }
        SessionError::NoAssistantReply => {
            api_error(StatusCode::BAD_GATEWAY, "NO_ASSISTANT_REPLY", e.to_string())
        }
        SessionError::EmptyUpload => api_error(StatusCode::BAD_REQUEST, "EMPTY_UPLOAD", e.to_string()),
        SessionError::Unsupported(_) => {
            api_error(StatusCode::NOT_IMPLEMENTED, "UNSUPPORTED", e.to_string())
        }
        SessionError::Remote(_) => api_error(StatusCode::BAD_GATEWAY, "REMOTE_ERROR", e.to_string()),
        SessionError::Run(run) => match run {
            RunError::DeadlineExceeded { .. } => {
                api_error(StatusCode::GATEWAY_TIMEOUT, "RUN_TIMEOUT", e.to_string())
            }
            RunError::Cancelled { .. } => api_error(StatusCode::CONFLICT, "RUN_CANCELLED", e.to_string()),
            RunError::Remote(_) => api_error(StatusCode::BAD_GATEWAY, "REMOTE_ERROR", e.to_string()),
            _ => api_error(StatusCode::BAD_GATEWAY, "RUN_FAILED", e.to_string()),
        },
        SessionError::Store(store) => store_error(store),
    }
}
