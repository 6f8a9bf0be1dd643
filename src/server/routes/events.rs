//! Server-Sent Events (SSE) endpoint for real-time updates

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use tokio_stream::StreamExt;

use crate::server::state::AppState;
use crate::server::types::{session_not_found, ApiError, ServerEvent};

/// GET /api/sessions/:id/events - SSE event stream
pub async fn session_events(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    if state.get_session(&session_id).await.is_none() {
        return Err(session_not_found(&session_id));
    }

    let rx = state.subscribe_events(&session_id).await;

    let stream = tokio_stream::wrappers::BroadcastStream::new(rx)
        .filter_map(|result| result.ok()) // lagged receivers skip ahead
        .map(|event: ServerEvent| {
            let json = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());

            Ok::<_, Infallible>(Event::default().event(event.name()).data(json))
        });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}
