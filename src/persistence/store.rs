//! Flat-file conversation log store
//!
//! Every conversation lives in `<logs_dir>/<sanitised title>_<id prefix>.json`.
//! Lookups by id scan the directory, which is fine for a single user's
//! history. There is no locking: one writer per file is assumed.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local, NaiveDateTime};
use tokio::fs;

use super::models::{ChatMessage, ConversationLog, ConversationSummary, LogHeader, TokenCount};
use crate::error::StoreError;
use crate::utils::sanitize_title;

/// Characters of the conversation id used in the filename
const ID_PREFIX_LEN: usize = 8;

pub struct ConversationStore {
    dir: PathBuf,
}

impl ConversationStore {
    /// Open the store, creating the directory if needed
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the full conversation to disk.
    ///
    /// `log_id` and `title` belong to the caller's conversation. Both are
    /// filled on the first save (a fresh id, a timestamped default title)
    /// and reused afterwards, so repeated saves overwrite the same file as
    /// long as the title is unchanged. A new title produces a new filename
    /// and leaves the old file behind.
    pub async fn save(
        &self,
        log_id: &mut Option<String>,
        title: &mut Option<String>,
        messages: &[ChatMessage],
        prompt_id: Option<&str>,
        token_count: &TokenCount,
    ) -> Result<PathBuf, StoreError> {
        if messages.is_empty() {
            tracing::warn!("No message history to save");
            return Err(StoreError::EmptyHistory);
        }

        let id = log_id
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
            .clone();

        if title.as_deref().map_or(true, |t| t.trim().is_empty()) {
            *title = Some(default_title(Local::now()));
        }
        let title = title.clone().unwrap_or_default();

        let file_stem = format!(
            "{}_{}",
            sanitize_title(&title),
            id.chars().take(ID_PREFIX_LEN).collect::<String>()
        );
        let path = self.dir.join(format!("{}.json", file_stem));

        let log = ConversationLog {
            id,
            title,
            timestamp: Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            prompt_id: prompt_id.map(str::to_string),
            messages: messages.to_vec(),
            token_count: *token_count,
        };

        let json = serde_json::to_string_pretty(&log).map_err(StoreError::Serialize)?;
        fs::write(&path, json)
            .await
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;

        tracing::info!("Conversation saved to {}", path.display());
        Ok(path)
    }

    /// Load the conversation whose `id` field matches
    pub async fn load(&self, id: &str) -> Result<ConversationLog, StoreError> {
        let path = self
            .find_path(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let content = read(&path).await?;
        serde_json::from_str(&content).map_err(|source| StoreError::Parse { path, source })
    }

    /// Summaries of every stored conversation, most recently modified
    /// file first. Files that fail to parse are logged and skipped.
    pub async fn list_all(&self) -> Vec<ConversationSummary> {
        let paths = match self.log_files().await {
            Ok(paths) => paths,
            Err(e) => {
                tracing::error!("Failed to list conversation logs: {}", e);
                return Vec::new();
            }
        };

        let mut files: Vec<(PathBuf, SystemTime)> = Vec::with_capacity(paths.len());
        for path in paths {
            let modified = fs::metadata(&path)
                .await
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((path, modified));
        }
        files.sort_by(|a, b| b.1.cmp(&a.1));

        let mut summaries = Vec::with_capacity(files.len());
        for (path, _) in files {
            match read_header(&path).await {
                Ok(header) => summaries.push(summarize(path, header)),
                Err(e) => tracing::error!("Skipping conversation log: {}", e),
            }
        }
        summaries
    }

    /// Remove the conversation with this id. Returns false if none matched.
    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let Some(path) = self.find_path(id).await? else {
            tracing::warn!("Could not find conversation with id {}", id);
            return Ok(false);
        };

        fs::remove_file(&path)
            .await
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;

        tracing::info!("Conversation deleted: {}", path.display());
        Ok(true)
    }

    /// `*.json` files in the store, in name order
    async fn log_files(&self) -> Result<Vec<PathBuf>, StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.dir.clone(),
            source,
        };
        let mut entries = fs::read_dir(&self.dir).await.map_err(io_err)?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let path = entry.path();
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if is_file && path.extension().and_then(|s| s.to_str()) == Some("json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    async fn find_path(&self, id: &str) -> Result<Option<PathBuf>, StoreError> {
        for path in self.log_files().await? {
            match read_header(&path).await {
                Ok(header) if header.id.as_deref() == Some(id) => return Ok(Some(path)),
                Ok(_) => {}
                Err(e) => tracing::debug!("Ignoring unreadable log during lookup: {}", e),
            }
        }
        Ok(None)
    }
}

/// Title used when a conversation is saved before one was generated
pub fn default_title(now: DateTime<Local>) -> String {
    format!("Samtale_{}", now.format("%Y%m%d_%H%M%S"))
}

/// Render an ISO-8601 timestamp as `DD-MM-YYYY HH:MM`
pub fn display_date(timestamp: &str) -> String {
    if let Ok(dt) = NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f") {
        return dt.format("%d-%m-%Y %H:%M").to_string();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp) {
        return dt.format("%d-%m-%Y %H:%M").to_string();
    }
    timestamp.to_string()
}

async fn read(path: &Path) -> Result<String, StoreError> {
    fs::read_to_string(path)
        .await
        .map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
}

async fn read_header(path: &Path) -> Result<LogHeader, StoreError> {
    let content = read(path).await?;
    serde_json::from_str(&content).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn summarize(path: PathBuf, header: LogHeader) -> ConversationSummary {
    let title = header.title.unwrap_or_else(|| {
        path.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    });
    let timestamp = header.timestamp.unwrap_or_default();

    ConversationSummary {
        id: header.id,
        title,
        display_date: display_date(&timestamp),
        timestamp,
        message_count: header.messages.len(),
        file_path: path,
    }
}
