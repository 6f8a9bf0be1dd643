//! Message handling endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::persistence::ChatMessage;
use crate::run::RunEvent;
use crate::server::routes::sessions::find_session;
use crate::server::state::AppState;
use crate::server::types::{
    api_error, session_busy, session_error, ApiError, SendMessageRequest, ServerEvent,
};
use crate::session::TurnReply;

/// GET /api/sessions/:id/messages - Get message history
pub async fn get_messages(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    let handle = find_session(&state, &session_id).await?;
    let session = handle.try_lock().ok_or_else(session_busy)?;

    Ok(Json(session.state().messages.clone()))
}

/// POST /api/sessions/:id/messages - Run one exchange.
///
/// Progress is broadcast on the session's event stream; the response
/// carries the reply once the run finished.
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<TurnReply>, ApiError> {
    let handle = find_session(&state, &session_id).await?;
    let mut session = handle.try_lock().ok_or_else(session_busy)?;

    let cancel = CancellationToken::new();
    *handle.cancel.write().await = Some(cancel.clone());

    let event_sender = state.get_event_sender(&session_id).await;
    let _ = event_sender.send(ServerEvent::Connected);
    let _ = event_sender.send(ServerEvent::Thinking {
        message: "Venter på svar fra assistenten".to_string(),
    });

    // Forward run progress to subscribers
    let (run_tx, mut run_rx) = mpsc::unbounded_channel::<RunEvent>();
    let forward_sender = event_sender.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(event) = run_rx.recv().await {
            let _ = forward_sender.send(event.into());
        }
    });

    // The turn runs in its own task so a dropped request does not abandon
    // it halfway through.
    let content = request.content;
    let cancel_slot = handle.cancel.clone();
    let turn = tokio::spawn(async move {
        let result = session.send_message(&content, &cancel, Some(&run_tx)).await;
        drop(run_tx);
        *cancel_slot.write().await = None;
        result
    });

    let result = turn.await.map_err(|e| {
        tracing::error!("Turn task for session {} failed: {}", session_id, e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string())
    })?;
    let _ = forwarder.await;

    match result {
        Ok(reply) => {
            let _ = event_sender.send(ServerEvent::Reply {
                text: reply.reply.clone(),
            });
            let _ = event_sender.send(ServerEvent::TokenUsage {
                input_tokens: reply.token_count.input,
                output_tokens: reply.token_count.output,
                total_tokens: reply.token_count.total,
            });
            if reply.title_generated {
                if let Some(title) = &reply.title {
                    let _ = event_sender.send(ServerEvent::TitleGenerated {
                        title: title.clone(),
                    });
                }
            }
            match (&reply.saved_path, &reply.save_error) {
                (Some(path), _) => {
                    let _ = event_sender.send(ServerEvent::Saved {
                        path: path.display().to_string(),
                    });
                }
                (None, Some(error)) => {
                    let _ = event_sender.send(ServerEvent::Error {
                        message: format!("Samtalen kunne ikke gemmes: {}", error),
                    });
                }
                (None, None) => {}
            }
            let _ = event_sender.send(ServerEvent::Completed);
            Ok(Json(reply))
        }
        Err(e) => {
            tracing::error!("Failed to process message for session {}: {}", session_id, e);
            let _ = event_sender.send(ServerEvent::Error {
                message: e.to_string(),
            });
            let _ = event_sender.send(ServerEvent::Completed);
            Err(session_error(&e))
        }
    }
}

/// POST /api/sessions/:id/cancel - Stop waiting for the current run
pub async fn cancel_operation(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let handle = find_session(&state, &session_id).await?;

    let token = handle.cancel.read().await.clone();
    match token {
        Some(token) => {
            token.cancel();
            tracing::info!("Cancellation requested for session {}", session_id);
            Ok(Json(serde_json::json!({ "status": "cancelled" })))
        }
        None => Ok(Json(serde_json::json!({ "status": "idle" }))),
    }
}
