//! Error types shared across the crate
//!
//! Each subsystem owns an error enum so callers can match on the failure
//! kind. Application glue (CLI, server bootstrap) wraps these in
//! `anyhow::Error` for context chains.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::llm::RunStatus;

/// Configuration and credential errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing credential: set the {var} environment variable")]
    MissingCredential { var: &'static str },

    #[error("could not determine config directory")]
    NoConfigDir,

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to write config file {path}: {message}")]
    Write { path: PathBuf, message: String },
}

/// Conversation log store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no message history to save")]
    EmptyHistory,

    #[error("conversation not found: {0}")]
    NotFound(String),

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid conversation log {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize conversation log: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Failures talking to the hosted assistant service
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("assistant API error on {endpoint} ({status}): {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("unexpected response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
}

impl RemoteError {
    /// HTTP status carried by the error, if the service answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Outcome of driving a run that did not complete successfully
#[derive(Debug, Error)]
pub enum RunError {
    #[error("run {run_id} ended with status {status}: {}", .detail.as_deref().unwrap_or("no details"))]
    Failed {
        run_id: String,
        status: RunStatus,
        detail: Option<String>,
    },

    #[error("run {run_id} did not finish within {waited:?}")]
    DeadlineExceeded { run_id: String, waited: Duration },

    #[error("run {run_id} was cancelled while waiting")]
    Cancelled { run_id: String },

    #[error("run {run_id} requires tool outputs but the service does not accept them")]
    ToolOutputsUnsupported { run_id: String },

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Errors surfaced by session controller operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("unknown prompt: {0}")]
    UnknownPrompt(String),

    #[error("the assistant produced no reply")]
    NoAssistantReply,

    #[error("uploaded file is empty")]
    EmptyUpload,

    #[error("the assistant service does not support {0}")]
    Unsupported(&'static str),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
