//! Server state management
//!
//! Shared state for the HTTP server: the process-wide services, one chat
//! session per browser tab and an event channel per session.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex, OwnedMutexGuard, RwLock};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::session::{ChatSession, Services};

use super::types::ServerEvent;

/// Shared application state for the server
pub struct AppState {
    /// Application configuration
    pub config: RwLock<Config>,

    /// Remote client, log store, prompt library and run driver
    pub services: Arc<Services>,

    /// Active sessions mapped by ID
    pub sessions: RwLock<HashMap<String, SessionHandle>>,

    /// Event broadcast channels per session
    pub event_channels: RwLock<HashMap<String, broadcast::Sender<ServerEvent>>>,
}

/// Handle to a browser tab's session
#[derive(Clone)]
pub struct SessionHandle {
    /// Held for the whole of a turn
    pub session: Arc<Mutex<ChatSession>>,

    /// Session creation timestamp
    pub created_at: chrono::DateTime<chrono::Utc>,

    /// Cancels the turn in progress, if any
    pub cancel: Arc<RwLock<Option<CancellationToken>>>,
}

impl SessionHandle {
    pub fn new(session: ChatSession) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            created_at: chrono::Utc::now(),
            cancel: Arc::new(RwLock::new(None)),
        }
    }

    /// Lock the session unless a turn is already running
    pub fn try_lock(&self) -> Option<OwnedMutexGuard<ChatSession>> {
        self.session.clone().try_lock_owned().ok()
    }
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config, services: Arc<Services>) -> Self {
        Self {
            config: RwLock::new(config),
            services,
            sessions: RwLock::new(HashMap::new()),
            event_channels: RwLock::new(HashMap::new()),
        }
    }

    /// Create a session and its event channel, returning its id
    pub async fn create_session(&self) -> (String, SessionHandle) {
        let session_id = uuid::Uuid::new_v4().to_string();
        let handle = SessionHandle::new(ChatSession::new(self.services.clone()));

        {
            let mut sessions = self.sessions.write().await;
            sessions.insert(session_id.clone(), handle.clone());
        }
        let _ = self.get_event_sender(&session_id).await;

        tracing::info!("Created session {}", session_id);
        (session_id, handle)
    }

    /// Drop a session and its event channel
    pub async fn remove_session(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(session_id);

        match removed {
            Some(handle) => {
                if let Some(token) = handle.cancel.read().await.as_ref() {
                    token.cancel();
                }
                self.event_channels.write().await.remove(session_id);
                true
            }
            None => false,
        }
    }

    /// Get or create an event channel for a session
    pub async fn get_event_sender(&self, session_id: &str) -> broadcast::Sender<ServerEvent> {
        let mut channels = self.event_channels.write().await;

        if let Some(sender) = channels.get(session_id) {
            sender.clone()
        } else {
            let (sender, _) = broadcast::channel(256);
            channels.insert(session_id.to_string(), sender.clone());
            sender
        }
    }

    /// Subscribe to events for a session
    pub async fn subscribe_events(&self, session_id: &str) -> broadcast::Receiver<ServerEvent> {
        let sender = self.get_event_sender(session_id).await;
        sender.subscribe()
    }

    /// Get a session by ID
    pub async fn get_session(&self, session_id: &str) -> Option<SessionHandle> {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).cloned()
    }
}
