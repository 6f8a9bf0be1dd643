//! Contract with the hosted assistant service
//!
//! The service is a black box exposing assistants, threads, messages and
//! runs, plus uploaded files and the document index the assistant searches.
//! [`AssistantApi`] is the seam the rest of the crate depends on;
//! [`openai::OpenAiAssistantsClient`] is the HTTP implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RemoteError;

#[cfg(test)]
pub(crate) mod mock;
pub mod openai;

/// Tool type toggled by the web browsing switch
pub const WEB_BROWSING_TOOL: &str = "web_browsing";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
        }
    }
}

/// Remote assistant configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assistant {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub tools: Vec<AssistantTool>,
}

impl Assistant {
    pub fn has_tool(&self, kind: &str) -> bool {
        self.tools.iter().any(|t| t.kind == kind)
    }
}

/// A tool entry on an assistant. Fields other than `type` are carried
/// through untouched so updates never drop tool configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantTool {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AssistantTool {
    pub fn of_kind(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Compute the tool list after switching web browsing on or off.
/// Returns `None` when the assistant already matches the request.
pub fn toggle_web_browsing(tools: &[AssistantTool], enable: bool) -> Option<Vec<AssistantTool>> {
    let present = tools.iter().any(|t| t.kind == WEB_BROWSING_TOOL);

    match (enable, present) {
        (true, false) => {
            let mut updated = tools.to_vec();
            updated.push(AssistantTool::of_kind(WEB_BROWSING_TOOL));
            Some(updated)
        }
        (false, true) => Some(
            tools
                .iter()
                .filter(|t| t.kind != WEB_BROWSING_TOOL)
                .cloned()
                .collect(),
        ),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
}

/// A message stored in a remote thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: Vec<MessageContent>,
    #[serde(default)]
    pub created_at: i64,
}

impl ThreadMessage {
    /// Concatenated text parts; images and other parts are skipped
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                MessageContent::Text { text } => Some(text.value.as_str()),
                MessageContent::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: TextContent },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    pub value: String,
    #[serde(default)]
    pub annotations: Vec<serde_json::Value>,
}

/// Lifecycle status of a run.
///
/// Values the service may add later land in `Unknown` instead of failing
/// to decode, so the driver can report them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Completed,
    Failed,
    Cancelled,
    Expired,
    Unknown(String),
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Expired => "expired",
            RunStatus::Unknown(raw) => raw,
        }
    }

    /// queued and in_progress are one state as far as polling is concerned
    pub fn is_pending(&self) -> bool {
        matches!(self, RunStatus::Queued | RunStatus::InProgress)
    }

    pub fn is_terminal_failure(&self) -> bool {
        matches!(
            self,
            RunStatus::Failed | RunStatus::Cancelled | RunStatus::Expired
        )
    }
}

impl From<String> for RunStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "queued" => RunStatus::Queued,
            "in_progress" => RunStatus::InProgress,
            "requires_action" => RunStatus::RequiresAction,
            "completed" => RunStatus::Completed,
            "failed" => RunStatus::Failed,
            "cancelled" => RunStatus::Cancelled,
            "expired" => RunStatus::Expired,
            _ => RunStatus::Unknown(raw),
        }
    }
}

impl From<RunStatus> for String {
    fn from(status: RunStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One assistant turn against a thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    pub status: RunStatus,
    #[serde(default)]
    pub required_action: Option<RequiredAction>,
    #[serde(default)]
    pub last_error: Option<RunLastError>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl Run {
    /// Tool calls waiting for outputs, empty unless the run asks for them
    pub fn pending_tool_calls(&self) -> &[ToolCall] {
        self.required_action
            .as_ref()
            .and_then(|action| action.submit_tool_outputs.as_ref())
            .map(|outputs| outputs.tool_calls.as_slice())
            .unwrap_or(&[])
    }

    pub fn error_detail(&self) -> Option<String> {
        self.last_error
            .as_ref()
            .map(|e| format!("{} ({})", e.message, e.code))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequiredAction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub submit_tool_outputs: Option<SubmitToolOutputs>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitToolOutputs {
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub function: Option<FunctionCall>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLastError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Token usage reported for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

impl Usage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

impl std::ops::Add for Usage {
    type Output = Usage;

    fn add(self, rhs: Usage) -> Usage {
        Usage {
            prompt_tokens: self.prompt_tokens + rhs.prompt_tokens,
            completion_tokens: self.completion_tokens + rhs.completion_tokens,
            total_tokens: self.total_tokens + rhs.total_tokens,
        }
    }
}

/// A file stored with the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub id: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub bytes: u64,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub purpose: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

/// Result of an operation the service may not offer
#[derive(Debug, Clone)]
pub enum RemoteResult<T> {
    Ok(T),
    Unsupported,
    Failed(RemoteError),
}

impl<T> RemoteResult<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            RemoteResult::Ok(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, RemoteResult::Ok(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RemoteResult<U> {
        match self {
            RemoteResult::Ok(value) => RemoteResult::Ok(f(value)),
            RemoteResult::Unsupported => RemoteResult::Unsupported,
            RemoteResult::Failed(e) => RemoteResult::Failed(e),
        }
    }
}

/// Optional operations supported by a concrete client, probed once at startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub submit_tool_outputs: bool,
    pub run_usage_listing: bool,
    pub cancel_run: bool,
    /// Files can be uploaded and listed
    pub file_uploads: bool,
    /// Files can be attached to and removed from the document index
    pub document_index: bool,
}

/// How token usage is read once a run completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageStrategy {
    /// Dedicated usage listing, falling back to the run record
    RunSteps,
    /// Usage fields on the retrieved run record only
    RunRecord,
}

impl UsageStrategy {
    pub fn select(capabilities: &Capabilities) -> Self {
        if capabilities.run_usage_listing {
            UsageStrategy::RunSteps
        } else {
            UsageStrategy::RunRecord
        }
    }
}

/// What happens to a file after it was uploaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileAttachStrategy {
    /// Attach it to the assistant's document index
    DocumentIndex,
    /// Leave attaching to the service dashboard
    Manual,
}

impl FileAttachStrategy {
    pub fn select(capabilities: &Capabilities) -> Self {
        if capabilities.document_index {
            FileAttachStrategy::DocumentIndex
        } else {
            FileAttachStrategy::Manual
        }
    }
}

#[async_trait]
pub trait AssistantApi: Send + Sync {
    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant, RemoteError>;

    async fn update_assistant_tools(
        &self,
        assistant_id: &str,
        tools: &[AssistantTool],
    ) -> Result<Assistant, RemoteError>;

    async fn create_thread(&self) -> Result<Thread, RemoteError>;

    /// Post a user message to a thread
    async fn add_user_message(
        &self,
        thread_id: &str,
        content: &str,
    ) -> Result<ThreadMessage, RemoteError>;

    /// Start a run, optionally overriding the assistant's instructions
    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        instructions: Option<&str>,
    ) -> Result<Run, RemoteError>;

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, RemoteError>;

    /// Messages in a thread, newest first
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, RemoteError>;

    /// One-shot text completion, used for side tasks such as titles
    async fn complete_text(
        &self,
        model: &str,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, RemoteError>;

    async fn submit_tool_outputs(
        &self,
        _thread_id: &str,
        _run_id: &str,
        _outputs: &[ToolOutput],
    ) -> RemoteResult<Run> {
        RemoteResult::Unsupported
    }

    /// Usage from a dedicated listing rather than the run record
    async fn run_usage(&self, _thread_id: &str, _run_id: &str) -> RemoteResult<Usage> {
        RemoteResult::Unsupported
    }

    async fn cancel_run(&self, _thread_id: &str, _run_id: &str) -> RemoteResult<Run> {
        RemoteResult::Unsupported
    }

    /// Upload a file for use by assistants
    async fn upload_file(&self, _filename: &str, _content: Vec<u8>) -> RemoteResult<RemoteFile> {
        RemoteResult::Unsupported
    }

    /// Every file in the account
    async fn list_files(&self) -> RemoteResult<Vec<RemoteFile>> {
        RemoteResult::Unsupported
    }

    /// Add an uploaded file to a document index
    async fn attach_file(&self, _index_id: &str, _file_id: &str) -> RemoteResult<()> {
        RemoteResult::Unsupported
    }

    /// Ids of the files in a document index
    async fn list_attached_files(&self, _index_id: &str) -> RemoteResult<Vec<String>> {
        RemoteResult::Unsupported
    }

    /// Remove a file from a document index. The file itself is kept.
    async fn detach_file(&self, _index_id: &str, _file_id: &str) -> RemoteResult<()> {
        RemoteResult::Unsupported
    }

    async fn probe_capabilities(&self) -> Capabilities {
        Capabilities::default()
    }
}
