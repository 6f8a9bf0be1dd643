//! Scripted in-memory AssistantApi for unit tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{
    Assistant, AssistantApi, AssistantTool, Capabilities, MessageContent, RemoteFile,
    RemoteResult, Role, Run, RunStatus, TextContent, Thread, ThreadMessage, ToolOutput, Usage,
};
use crate::error::RemoteError;

pub(crate) struct MockAssistantApi {
    /// Answers to retrieve_run; the last entry repeats once the script runs out
    pub runs: Mutex<VecDeque<Run>>,
    pub initial_status: RunStatus,
    pub capabilities: Capabilities,
    pub steps_usage: Mutex<RemoteResult<Usage>>,
    pub reply: Mutex<Option<String>>,
    pub completion: Mutex<Result<String, RemoteError>>,
    pub assistant: Mutex<Assistant>,
    pub fail_add_message: bool,
    pub fail_attach: bool,
    /// Files in the account
    pub files: Mutex<Vec<RemoteFile>>,
    /// File ids in the document index
    pub attached: Mutex<Vec<String>>,

    pub retrieve_calls: AtomicUsize,
    pub threads_created: AtomicUsize,
    pub tool_updates: AtomicUsize,
    pub submitted: Mutex<Vec<Vec<ToolOutput>>>,
    pub posted: Mutex<Vec<(String, String)>>,
    pub instructions: Mutex<Vec<Option<String>>>,
    pub cancelled: Mutex<Vec<String>>,
    pub prompts: Mutex<Vec<String>>,
}

impl Default for MockAssistantApi {
    fn default() -> Self {
        Self {
            runs: Mutex::new(VecDeque::new()),
            initial_status: RunStatus::Queued,
            capabilities: Capabilities {
                submit_tool_outputs: true,
                run_usage_listing: false,
                cancel_run: true,
                file_uploads: true,
                document_index: true,
            },
            steps_usage: Mutex::new(RemoteResult::Unsupported),
            reply: Mutex::new(Some("Emne: Testsvar".to_string())),
            completion: Mutex::new(Ok("Fradrag for befordring".to_string())),
            assistant: Mutex::new(Assistant {
                id: "asst_test".to_string(),
                name: Some("Skatteret".to_string()),
                model: "o3-mini".to_string(),
                instructions: None,
                tools: vec![AssistantTool::of_kind("file_search")],
            }),
            fail_add_message: false,
            fail_attach: false,
            files: Mutex::new(Vec::new()),
            attached: Mutex::new(Vec::new()),
            retrieve_calls: AtomicUsize::new(0),
            threads_created: AtomicUsize::new(0),
            tool_updates: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
            posted: Mutex::new(Vec::new()),
            instructions: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

impl MockAssistantApi {
    pub fn with_runs(runs: Vec<Run>) -> Self {
        Self {
            runs: Mutex::new(runs.into()),
            ..Self::default()
        }
    }

    pub fn submitted_count(&self) -> usize {
        self.submitted.lock().unwrap().iter().map(Vec::len).sum()
    }
}

pub(crate) fn run(status: &str) -> Run {
    Run {
        id: "run_1".to_string(),
        thread_id: Some("thread_1".to_string()),
        status: RunStatus::from(status.to_string()),
        required_action: None,
        last_error: None,
        usage: None,
    }
}

pub(crate) fn run_with_usage(status: &str, prompt: u64, completion: u64) -> Run {
    Run {
        usage: Some(Usage::new(prompt, completion)),
        ..run(status)
    }
}

pub(crate) fn run_requiring_tools(call_ids: &[&str]) -> Run {
    let calls: Vec<_> = call_ids
        .iter()
        .map(|id| serde_json::json!({"id": id, "type": "function", "function": {"name": "lookup", "arguments": "{}"}}))
        .collect();

    serde_json::from_value(serde_json::json!({
        "id": "run_1",
        "status": "requires_action",
        "required_action": {
            "type": "submit_tool_outputs",
            "submit_tool_outputs": {"tool_calls": calls}
        }
    }))
    .unwrap()
}

fn text_message(id: &str, role: Role, text: &str) -> ThreadMessage {
    ThreadMessage {
        id: id.to_string(),
        role,
        content: vec![MessageContent::Text {
            text: TextContent {
                value: text.to_string(),
                annotations: Vec::new(),
            },
        }],
        created_at: 0,
    }
}

#[async_trait]
impl AssistantApi for MockAssistantApi {
    async fn retrieve_assistant(&self, _assistant_id: &str) -> Result<Assistant, RemoteError> {
        Ok(self.assistant.lock().unwrap().clone())
    }

    async fn update_assistant_tools(
        &self,
        _assistant_id: &str,
        tools: &[AssistantTool],
    ) -> Result<Assistant, RemoteError> {
        self.tool_updates.fetch_add(1, Ordering::SeqCst);
        let mut assistant = self.assistant.lock().unwrap();
        assistant.tools = tools.to_vec();
        Ok(assistant.clone())
    }

    async fn create_thread(&self) -> Result<Thread, RemoteError> {
        let n = self.threads_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Thread {
            id: format!("thread_{n}"),
        })
    }

    async fn add_user_message(
        &self,
        thread_id: &str,
        content: &str,
    ) -> Result<ThreadMessage, RemoteError> {
        if self.fail_add_message {
            return Err(RemoteError::Transport {
                endpoint: "/threads/messages".to_string(),
                message: "connection reset".to_string(),
            });
        }
        self.posted
            .lock()
            .unwrap()
            .push((thread_id.to_string(), content.to_string()));
        Ok(text_message("msg_user", Role::User, content))
    }

    async fn create_run(
        &self,
        _thread_id: &str,
        _assistant_id: &str,
        instructions: Option<&str>,
    ) -> Result<Run, RemoteError> {
        self.instructions
            .lock()
            .unwrap()
            .push(instructions.map(str::to_string));
        Ok(run(self.initial_status.as_str()))
    }

    async fn retrieve_run(&self, _thread_id: &str, _run_id: &str) -> Result<Run, RemoteError> {
        self.retrieve_calls.fetch_add(1, Ordering::SeqCst);
        let mut runs = self.runs.lock().unwrap();
        let next = if runs.len() > 1 {
            runs.pop_front()
        } else {
            runs.front().cloned()
        };
        Ok(next.unwrap_or_else(|| run("completed")))
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, RemoteError> {
        let mut messages = Vec::new();
        if let Some(reply) = self.reply.lock().unwrap().clone() {
            messages.push(text_message("msg_reply", Role::Assistant, &reply));
        }
        if let Some((_, content)) = self
            .posted
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(t, _)| t == thread_id)
        {
            messages.push(text_message("msg_user", Role::User, content));
        }
        Ok(messages)
    }

    async fn complete_text(
        &self,
        _model: &str,
        prompt: &str,
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<String, RemoteError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.completion.lock().unwrap().clone()
    }

    async fn submit_tool_outputs(
        &self,
        _thread_id: &str,
        _run_id: &str,
        outputs: &[ToolOutput],
    ) -> RemoteResult<Run> {
        if !self.capabilities.submit_tool_outputs {
            return RemoteResult::Unsupported;
        }
        self.submitted.lock().unwrap().push(outputs.to_vec());
        RemoteResult::Ok(run("queued"))
    }

    async fn run_usage(&self, _thread_id: &str, _run_id: &str) -> RemoteResult<Usage> {
        self.steps_usage.lock().unwrap().clone()
    }

    async fn cancel_run(&self, _thread_id: &str, run_id: &str) -> RemoteResult<Run> {
        self.cancelled.lock().unwrap().push(run_id.to_string());
        RemoteResult::Ok(run("cancelling"))
    }

    async fn upload_file(&self, filename: &str, content: Vec<u8>) -> RemoteResult<RemoteFile> {
        if !self.capabilities.file_uploads {
            return RemoteResult::Unsupported;
        }
        let mut files = self.files.lock().unwrap();
        let file = RemoteFile {
            id: format!("file_{}", files.len() + 1),
            filename: filename.to_string(),
            bytes: content.len() as u64,
            created_at: 0,
            purpose: "assistants".to_string(),
        };
        files.push(file.clone());
        RemoteResult::Ok(file)
    }

    async fn list_files(&self) -> RemoteResult<Vec<RemoteFile>> {
        if !self.capabilities.file_uploads {
            return RemoteResult::Unsupported;
        }
        RemoteResult::Ok(self.files.lock().unwrap().clone())
    }

    async fn attach_file(&self, _index_id: &str, file_id: &str) -> RemoteResult<()> {
        if !self.capabilities.document_index {
            return RemoteResult::Unsupported;
        }
        if self.fail_attach {
            return RemoteResult::Failed(RemoteError::Api {
                endpoint: "/vector_stores/files".to_string(),
                status: 500,
                body: "index unavailable".to_string(),
            });
        }
        self.attached.lock().unwrap().push(file_id.to_string());
        RemoteResult::Ok(())
    }

    async fn list_attached_files(&self, _index_id: &str) -> RemoteResult<Vec<String>> {
        if !self.capabilities.document_index {
            return RemoteResult::Unsupported;
        }
        RemoteResult::Ok(self.attached.lock().unwrap().clone())
    }

    async fn detach_file(&self, _index_id: &str, file_id: &str) -> RemoteResult<()> {
        if !self.capabilities.document_index {
            return RemoteResult::Unsupported;
        }
        self.attached.lock().unwrap().retain(|id| id != file_id);
        RemoteResult::Ok(())
    }

    async fn probe_capabilities(&self) -> Capabilities {
        self.capabilities
    }
}
