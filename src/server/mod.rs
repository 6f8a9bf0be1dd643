//! HTTP server for the browser front-end
//!
//! Serves the two-pane chat page and the REST/SSE API behind it. Each
//! browser tab owns one chat session, created with `POST /api/sessions`.

pub mod routes;
pub mod state;
pub mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::llm::AssistantApi;
use crate::session::Services;
use state::AppState;

/// Build the application router
pub fn build_router(state: Arc<AppState>, cors_enabled: bool) -> Router {
    let mut app = Router::new()
        // Page
        .route("/", get(routes::ui::index))

        // Health & config
        .route("/api/health", get(routes::health::health_check))
        .route("/api/config", get(routes::config::get_config))
        .route("/api/assistant", get(routes::config::get_assistant))
        .route("/api/prompts", get(routes::prompts::list_prompts))

        // Sessions
        .route("/api/sessions", post(routes::sessions::create_session))
        .route(
            "/api/sessions/:id",
            get(routes::sessions::get_session).delete(routes::sessions::delete_session),
        )
        .route("/api/sessions/:id/new", post(routes::sessions::new_conversation))
        .route("/api/sessions/:id/prompt", put(routes::sessions::select_prompt))
        .route("/api/sessions/:id/settings", put(routes::sessions::update_settings))
        .route("/api/sessions/:id/title", put(routes::sessions::set_title))
        .route("/api/sessions/:id/save", post(routes::sessions::save_conversation))
        .route("/api/sessions/:id/load", post(routes::sessions::load_conversation))

        // Messages
        .route(
            "/api/sessions/:id/messages",
            get(routes::messages::get_messages).post(routes::messages::send_message),
        )
        .route("/api/sessions/:id/cancel", post(routes::messages::cancel_operation))

        // Files and the assistant's document index
        .route("/api/files", get(routes::files::list_available_files))
        .route(
            "/api/sessions/:id/files",
            get(routes::files::list_session_files).post(routes::files::upload_file),
        )
        .route("/api/sessions/:id/files/:file_id", delete(routes::files::remove_file))

        // Real-time events (SSE)
        .route("/api/sessions/:id/events", get(routes::events::session_events))

        // Stored conversations
        .route("/api/conversations", get(routes::conversations::list_conversations))
        .route(
            "/api/conversations/:id",
            get(routes::conversations::get_conversation)
                .delete(routes::conversations::delete_conversation),
        )

        .with_state(state)
        .layer(DefaultBodyLimit::max(routes::files::MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http());

    if cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

/// Start the HTTP server
pub async fn start_server(config: Config, api: Arc<dyn AssistantApi>) -> anyhow::Result<()> {
    let services = Arc::new(Services::new(&config, api).await?);
    tracing::info!(
        prompts = services.prompts.len(),
        logs = %services.store.dir().display(),
        "Services ready"
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid address: {}:{}",
                config.server.host, config.server.port
            )
        })?;
    let cors_enabled = config.server.cors_enabled;

    let state = Arc::new(AppState::new(config, services));
    let app = build_router(state, cors_enabled);

    println!("Starting skatteret assistant on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
