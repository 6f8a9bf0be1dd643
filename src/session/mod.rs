//! Chat session controller
//!
//! A [`ChatSession`] is the explicit per-tab context: it owns the mutable
//! [`SessionState`] and shares the process-wide [`Services`] (remote client,
//! log store, prompt library, run driver). Every operation takes the session
//! by reference; nothing lives in globals.
//!
//! Besides the conversation itself a session tracks the files uploaded from
//! it and the contents of the assistant's document index.

pub mod title;

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, PricingConfig};
use crate::error::SessionError;
use crate::llm::{
    toggle_web_browsing, Assistant, AssistantApi, Capabilities, FileAttachStrategy, RemoteFile,
    RemoteResult, Role, Usage, UsageStrategy,
};
use crate::persistence::{ChatMessage, ConversationStore, TokenCount};
use crate::prompts::{system_instructions, PromptLibrary};
use crate::run::{PollSettings, RunDriver, RunEvent};

pub use title::generate_title;

/// Shared, read-mostly collaborators used by every session
pub struct Services {
    pub api: Arc<dyn AssistantApi>,
    pub store: ConversationStore,
    pub prompts: PromptLibrary,
    pub driver: RunDriver,
    pub capabilities: Capabilities,
    pub file_strategy: FileAttachStrategy,
    pub assistant_id: String,
    pub vector_store_id: String,
    pub title_model: String,
    /// Initial value of the fixed-structure toggle for new sessions
    pub use_fixed_structure: bool,
    pub pricing: PricingConfig,
}

impl Services {
    /// Ask the service for its capabilities once, open the log store and
    /// load the prompt library
    pub async fn new(config: &Config, api: Arc<dyn AssistantApi>) -> Result<Self> {
        let capabilities = api.probe_capabilities().await;
        let usage_strategy = UsageStrategy::select(&capabilities);
        let file_strategy = FileAttachStrategy::select(&capabilities);
        tracing::info!(
            ?capabilities,
            ?usage_strategy,
            ?file_strategy,
            "Assistant service capabilities"
        );

        let store = ConversationStore::new(config.storage.logs_dir.clone())
            .await
            .with_context(|| {
                format!(
                    "Failed to open conversation log directory {}",
                    config.storage.logs_dir.display()
                )
            })?;
        let prompts = PromptLibrary::load_all(&config.storage.prompts_dir).await?;
        let driver = RunDriver::new(
            api.clone(),
            PollSettings::from(&config.polling),
            usage_strategy,
        );

        Ok(Self {
            api,
            store,
            prompts,
            driver,
            capabilities,
            file_strategy,
            assistant_id: config.assistant.assistant_id.clone(),
            vector_store_id: config.assistant.vector_store_id.clone(),
            title_model: config.assistant.title_model.clone(),
            use_fixed_structure: config.assistant.use_fixed_structure,
            pricing: config.pricing.clone(),
        })
    }

    /// Every file in the service account; empty when the service cannot
    /// list files
    pub async fn available_files(&self) -> Result<Vec<RemoteFile>, SessionError> {
        match self.api.list_files().await {
            RemoteResult::Ok(files) => Ok(files),
            RemoteResult::Unsupported => Ok(Vec::new()),
            RemoteResult::Failed(e) => Err(e.into()),
        }
    }
}

/// Everything a browser tab knows about its conversation
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionState {
    pub assistant_id: String,
    pub thread_id: Option<String>,
    pub run_id: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub active_prompt: Option<String>,
    pub token_count: TokenCount,
    pub log_id: Option<String>,
    pub conversation_title: Option<String>,
    /// Set after loading a stored conversation, cleared by the next exchange
    pub is_loaded_conversation: bool,
    pub enable_web_browsing: bool,
    pub use_fixed_structure: bool,
    /// Files uploaded from this session, oldest first
    pub uploaded_files: Vec<UploadedFile>,
    /// File ids in the assistant's document index, as last listed
    pub assistant_files: Vec<String>,
}

/// A file uploaded from a session
#[derive(Debug, Clone, Serialize)]
pub struct UploadedFile {
    #[serde(flatten)]
    pub file: RemoteFile,
    /// Whether the file is in the assistant's document index
    pub attached: bool,
    /// Why attaching failed, if it was attempted
    pub attach_error: Option<String>,
}

/// Files known to the session for the file panel
#[derive(Debug, Clone, Serialize)]
pub struct AssistantFiles {
    pub uploaded: Vec<UploadedFile>,
    pub attached: Vec<String>,
    /// False when the service cannot list the document index
    pub index_supported: bool,
}

/// Outcome of one user/assistant exchange
#[derive(Debug, Clone, Serialize)]
pub struct TurnReply {
    pub reply: String,
    /// Usage of this turn, when the service reported any
    pub usage: Option<Usage>,
    pub token_count: TokenCount,
    pub title: Option<String>,
    pub title_generated: bool,
    pub saved_path: Option<PathBuf>,
    pub save_error: Option<String>,
    pub polls: usize,
}

/// Read-only view of a session for the front-end
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    #[serde(flatten)]
    pub state: SessionState,
    pub prompt_title: Option<String>,
    pub estimated_cost_usd: f64,
}

pub struct ChatSession {
    state: SessionState,
    services: Arc<Services>,
}

impl ChatSession {
    pub fn new(services: Arc<Services>) -> Self {
        let state = SessionState {
            assistant_id: services.assistant_id.clone(),
            use_fixed_structure: services.use_fixed_structure,
            ..SessionState::default()
        };
        Self { state, services }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    /// Forget the current conversation. Prompt and toggles are kept.
    pub fn new_conversation(&mut self) {
        let state = &mut self.state;
        state.thread_id = None;
        state.run_id = None;
        state.messages.clear();
        state.token_count = TokenCount::default();
        state.log_id = None;
        state.conversation_title = None;
        state.is_loaded_conversation = false;
        tracing::info!("Started a new conversation");
    }

    /// Select the prompt used for later runs; `None` clears it
    pub fn select_prompt(&mut self, prompt_id: Option<&str>) -> Result<(), SessionError> {
        match prompt_id {
            Some(id) if !self.services.prompts.contains(id) => {
                Err(SessionError::UnknownPrompt(id.to_string()))
            }
            _ => {
                self.state.active_prompt = prompt_id.map(str::to_string);
                Ok(())
            }
        }
    }

    pub fn set_use_fixed_structure(&mut self, enabled: bool) {
        self.state.use_fixed_structure = enabled;
    }

    /// Add or remove the web browsing tool on the remote assistant.
    ///
    /// The assistant is only updated when its tool list actually changes, and
    /// the session flag follows only once the service accepted the change.
    /// Returns whether an update was sent.
    pub async fn set_web_browsing(&mut self, enable: bool) -> Result<bool, SessionError> {
        let api = &self.services.api;
        let assistant = api.retrieve_assistant(&self.state.assistant_id).await?;

        let changed = match toggle_web_browsing(&assistant.tools, enable) {
            Some(tools) => {
                api.update_assistant_tools(&self.state.assistant_id, &tools)
                    .await?;
                tracing::info!(enable, "Updated assistant web browsing tool");
                true
            }
            None => false,
        };

        self.state.enable_web_browsing = enable;
        Ok(changed)
    }

    pub async fn assistant_info(&self) -> Result<Assistant, SessionError> {
        Ok(self
            .services
            .api
            .retrieve_assistant(&self.state.assistant_id)
            .await?)
    }

    /// Run one exchange: post the message, drive the run, append the reply,
    /// name the conversation after its first exchange and save it.
    pub async fn send_message(
        &mut self,
        content: &str,
        cancel: &CancellationToken,
        events: Option<&mpsc::UnboundedSender<RunEvent>>,
    ) -> Result<TurnReply, SessionError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        let services = self.services.clone();
        let api = services.api.as_ref();

        let thread_id = self.ensure_thread().await?;

        api.add_user_message(&thread_id, content).await?;
        self.state.messages.push(ChatMessage::user(content));

        let instructions = system_instructions(
            self.state.use_fixed_structure,
            self.state.active_prompt.as_deref(),
            &services.prompts,
        );
        let run = api
            .create_run(&thread_id, &self.state.assistant_id, instructions.as_deref())
            .await?;
        tracing::info!(run_id = %run.id, thread_id = %thread_id, "Started run");
        self.state.run_id = Some(run.id.clone());

        let completed = services.driver.drive(&thread_id, run, cancel, events).await?;

        if let Some(usage) = &completed.usage {
            self.state.token_count.add_usage(usage);
        }

        let reply = api
            .list_messages(&thread_id)
            .await?
            .into_iter()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.text())
            .ok_or(SessionError::NoAssistantReply)?;

        self.state.messages.push(ChatMessage::assistant(reply.clone()));
        self.state.is_loaded_conversation = false;

        let mut title_generated = false;
        if self.state.conversation_title.is_none() {
            let title = generate_title(api, &services.title_model, &self.state.messages).await;
            tracing::info!("Generated conversation title: {}", title);
            self.state.conversation_title = Some(title);
            title_generated = true;
        }

        let (saved_path, save_error) = match self.save().await {
            Ok(path) => (Some(path), None),
            Err(e) => {
                tracing::error!("Failed to save conversation: {}", e);
                (None, Some(e.to_string()))
            }
        };

        Ok(TurnReply {
            reply,
            usage: completed.usage,
            token_count: self.state.token_count,
            title: self.state.conversation_title.clone(),
            title_generated,
            saved_path,
            save_error,
            polls: completed.polls,
        })
    }

    /// Current thread, or a fresh one for new and freshly loaded conversations
    async fn ensure_thread(&mut self) -> Result<String, SessionError> {
        match &self.state.thread_id {
            Some(id) if !self.state.is_loaded_conversation => Ok(id.clone()),
            _ => {
                let thread = self.services.api.create_thread().await?;
                tracing::info!(thread_id = %thread.id, "Created thread");
                self.state.thread_id = Some(thread.id.clone());
                Ok(thread.id)
            }
        }
    }

    /// Persist the conversation under its log id and title, assigning both
    /// on first save
    pub async fn save(&mut self) -> Result<PathBuf, SessionError> {
        let state = &mut self.state;
        Ok(self
            .services
            .store
            .save(
                &mut state.log_id,
                &mut state.conversation_title,
                &state.messages,
                state.active_prompt.as_deref(),
                &state.token_count,
            )
            .await?)
    }

    /// Replace the session's conversation with a stored one. The next
    /// message starts a fresh remote thread; saves keep the stored id.
    pub async fn load_conversation(&mut self, id: &str) -> Result<(), SessionError> {
        let log = self.services.store.load(id).await?;

        if let Some(prompt) = &log.prompt_id {
            if !self.services.prompts.contains(prompt) {
                tracing::warn!("Loaded conversation references unknown prompt {}", prompt);
            }
        }

        let state = &mut self.state;
        state.thread_id = None;
        state.run_id = None;
        state.messages = log.messages;
        state.active_prompt = log.prompt_id;
        state.token_count = log.token_count;
        state.log_id = Some(log.id);
        state.conversation_title = Some(log.title);
        state.is_loaded_conversation = true;

        tracing::info!("Loaded conversation {}", id);
        Ok(())
    }

    /// Rename the conversation; blank titles clear it. Takes effect on the
    /// next save, which writes a new file.
    pub fn set_title(&mut self, title: &str) {
        let title = title.trim();
        self.state.conversation_title = (!title.is_empty()).then(|| title.to_string());
    }

    /// Upload a file and, where the service allows it, add it to the
    /// assistant's document index. An upload whose attach step fails is
    /// still recorded, with `attached` false.
    pub async fn upload_file(
        &mut self,
        filename: &str,
        content: Vec<u8>,
    ) -> Result<UploadedFile, SessionError> {
        if content.is_empty() {
            return Err(SessionError::EmptyUpload);
        }

        let services = self.services.clone();
        let file = match services.api.upload_file(filename, content).await {
            RemoteResult::Ok(file) => file,
            RemoteResult::Unsupported => return Err(SessionError::Unsupported("file uploads")),
            RemoteResult::Failed(e) => return Err(e.into()),
        };

        let (attached, attach_error) = match services.file_strategy {
            FileAttachStrategy::DocumentIndex => {
                match services
                    .api
                    .attach_file(&services.vector_store_id, &file.id)
                    .await
                {
                    RemoteResult::Ok(()) => (true, None),
                    RemoteResult::Unsupported => {
                        tracing::warn!(file_id = %file.id, "Document index unavailable, attach the file manually");
                        (false, None)
                    }
                    RemoteResult::Failed(e) => {
                        tracing::error!(file_id = %file.id, "Failed to attach file: {}", e);
                        (false, Some(e.to_string()))
                    }
                }
            }
            FileAttachStrategy::Manual => (false, None),
        };

        if attached && !self.state.assistant_files.contains(&file.id) {
            self.state.assistant_files.push(file.id.clone());
        }

        let uploaded = UploadedFile {
            file,
            attached,
            attach_error,
        };
        self.state.uploaded_files.push(uploaded.clone());
        Ok(uploaded)
    }

    /// Re-read the document index. A service without index listing yields
    /// an empty list.
    pub async fn assistant_files(&mut self) -> Result<AssistantFiles, SessionError> {
        let services = &self.services;
        let index_supported = match services
            .api
            .list_attached_files(&services.vector_store_id)
            .await
        {
            RemoteResult::Ok(ids) => {
                self.state.assistant_files = ids;
                true
            }
            RemoteResult::Unsupported => {
                self.state.assistant_files.clear();
                false
            }
            RemoteResult::Failed(e) => return Err(e.into()),
        };

        let attached = &self.state.assistant_files;
        for uploaded in &mut self.state.uploaded_files {
            uploaded.attached = attached.contains(&uploaded.file.id);
        }

        Ok(AssistantFiles {
            uploaded: self.state.uploaded_files.clone(),
            attached: self.state.assistant_files.clone(),
            index_supported,
        })
    }

    /// Take a file out of the document index. Returns false when the
    /// service cannot do this and the file has to be removed by hand.
    pub async fn remove_file(&mut self, file_id: &str) -> Result<bool, SessionError> {
        let services = &self.services;
        match services
            .api
            .detach_file(&services.vector_store_id, file_id)
            .await
        {
            RemoteResult::Ok(()) => {
                self.state.assistant_files.retain(|id| id != file_id);
                for uploaded in &mut self.state.uploaded_files {
                    if uploaded.file.id == file_id {
                        uploaded.attached = false;
                    }
                }
                tracing::info!(file_id, "Removed file from document index");
                Ok(true)
            }
            RemoteResult::Unsupported => Ok(false),
            RemoteResult::Failed(e) => Err(e.into()),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let prompt_title = self
            .state
            .active_prompt
            .as_deref()
            .and_then(|id| self.services.prompts.get(id))
            .map(|p| p.title.clone());

        SessionSnapshot {
            state: self.state.clone(),
            prompt_title,
            estimated_cost_usd: self.state.token_count.estimated_cost_usd(&self.services.pricing),
        }
    }
}
