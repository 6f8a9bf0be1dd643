//! HTTP client for the OpenAI assistants API (v2)
//!
//! Covers assistants, threads, messages and runs, file uploads and the
//! vector store backing the assistant's file search, plus a plain chat
//! completion used for conversation titles.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{
    Assistant, AssistantApi, AssistantTool, Capabilities, RemoteFile, RemoteResult, Run, Thread,
    ThreadMessage, ToolOutput, Usage,
};
use crate::config::AssistantConfig;
use crate::error::RemoteError;

pub struct OpenAiAssistantsClient {
    api_key: String,
    /// Base URL without trailing slash, e.g. "https://api.openai.com/v1"
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct UpdateToolsRequest<'a> {
    tools: &'a [AssistantTool],
}

#[derive(Debug, Serialize)]
struct CreateMessageRequest<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateRunRequest<'a> {
    assistant_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct SubmitToolOutputsRequest<'a> {
    tool_outputs: &'a [ToolOutput],
}

#[derive(Debug, Serialize)]
struct AttachFileRequest<'a> {
    file_id: &'a str,
}

/// Entry of a vector store file listing; `id` is the file id
#[derive(Debug, Deserialize)]
struct VectorStoreFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct RunStep {
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatRequestMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatRequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl OpenAiAssistantsClient {
    pub fn new(api_key: String, base_url: String, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn from_config(config: &AssistantConfig, api_key: String) -> Self {
        Self::new(api_key, config.base_url.clone(), config.request_timeout_secs)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("OpenAI-Beta", "assistants=v2")
    }

    async fn send<T: DeserializeOwned>(
        &self,
        path: &str,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, RemoteError> {
        let response = builder.send().await.map_err(|e| RemoteError::Transport {
            endpoint: path.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api {
                endpoint: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        response.json::<T>().await.map_err(|e| RemoteError::Decode {
            endpoint: path.to_string(),
            message: e.to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, RemoteError> {
        self.send(path, self.request(reqwest::Method::GET, path))
            .await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, RemoteError> {
        self.send(path, self.request(reqwest::Method::POST, path).json(body))
            .await
    }

    async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, RemoteError> {
        self.send(path, self.request(reqwest::Method::DELETE, path))
            .await
    }
}

/// Endpoints that do not exist on a server answer 404/405
fn is_unsupported(error: &RemoteError) -> bool {
    matches!(
        error.status().and_then(|s| StatusCode::from_u16(s).ok()),
        Some(StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED)
    )
}

fn optional<T>(result: Result<T, RemoteError>) -> RemoteResult<T> {
    match result {
        Ok(value) => RemoteResult::Ok(value),
        Err(e) if is_unsupported(&e) => RemoteResult::Unsupported,
        Err(e) => RemoteResult::Failed(e),
    }
}

#[async_trait]
impl AssistantApi for OpenAiAssistantsClient {
    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant, RemoteError> {
        self.get(&format!("/assistants/{}", assistant_id)).await
    }

    async fn update_assistant_tools(
        &self,
        assistant_id: &str,
        tools: &[AssistantTool],
    ) -> Result<Assistant, RemoteError> {
        let assistant: Assistant = self
            .post(
                &format!("/assistants/{}", assistant_id),
                &UpdateToolsRequest { tools },
            )
            .await?;
        tracing::info!(assistant_id, tools = assistant.tools.len(), "Updated assistant tools");
        Ok(assistant)
    }

    async fn create_thread(&self) -> Result<Thread, RemoteError> {
        self.post("/threads", &serde_json::json!({})).await
    }

    async fn add_user_message(
        &self,
        thread_id: &str,
        content: &str,
    ) -> Result<ThreadMessage, RemoteError> {
        self.post(
            &format!("/threads/{}/messages", thread_id),
            &CreateMessageRequest {
                role: "user",
                content,
            },
        )
        .await
    }

    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        instructions: Option<&str>,
    ) -> Result<Run, RemoteError> {
        self.post(
            &format!("/threads/{}/runs", thread_id),
            &CreateRunRequest {
                assistant_id,
                instructions,
            },
        )
        .await
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, RemoteError> {
        self.get(&format!("/threads/{}/runs/{}", thread_id, run_id))
            .await
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, RemoteError> {
        let list: ListResponse<ThreadMessage> = self
            .get(&format!("/threads/{}/messages?order=desc", thread_id))
            .await?;
        Ok(list.data)
    }

    async fn complete_text(
        &self,
        model: &str,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, RemoteError> {
        let path = "/chat/completions";
        let request = ChatRequest {
            model,
            messages: vec![ChatRequestMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens,
            temperature,
        };

        let response: ChatResponse = self.post(path, &request).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RemoteError::Decode {
                endpoint: path.to_string(),
                message: "completion contained no choices".to_string(),
            })
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> RemoteResult<Run> {
        optional(
            self.post(
                &format!("/threads/{}/runs/{}/submit_tool_outputs", thread_id, run_id),
                &SubmitToolOutputsRequest {
                    tool_outputs: outputs,
                },
            )
            .await,
        )
    }

    async fn run_usage(&self, thread_id: &str, run_id: &str) -> RemoteResult<Usage> {
        let steps: Result<ListResponse<RunStep>, _> = self
            .get(&format!("/threads/{}/runs/{}/steps", thread_id, run_id))
            .await;

        match optional(steps) {
            RemoteResult::Ok(list) => {
                let usages: Vec<Usage> = list.data.into_iter().filter_map(|s| s.usage).collect();
                if usages.is_empty() {
                    // steps exist but carry no numbers; let the caller fall back
                    RemoteResult::Unsupported
                } else {
                    RemoteResult::Ok(usages.into_iter().fold(Usage::default(), |acc, u| acc + u))
                }
            }
            RemoteResult::Unsupported => RemoteResult::Unsupported,
            RemoteResult::Failed(e) => RemoteResult::Failed(e),
        }
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> RemoteResult<Run> {
        optional(
            self.post(
                &format!("/threads/{}/runs/{}/cancel", thread_id, run_id),
                &serde_json::json!({}),
            )
            .await,
        )
    }

    async fn upload_file(&self, filename: &str, content: Vec<u8>) -> RemoteResult<RemoteFile> {
        let path = "/files";
        let form = reqwest::multipart::Form::new()
            .text("purpose", "assistants")
            .part(
                "file",
                reqwest::multipart::Part::bytes(content).file_name(filename.to_string()),
            );

        let result: Result<RemoteFile, _> = self
            .send(path, self.request(reqwest::Method::POST, path).multipart(form))
            .await;
        if let Ok(file) = &result {
            tracing::info!(file_id = %file.id, filename, "Uploaded file");
        }
        optional(result)
    }

    async fn list_files(&self) -> RemoteResult<Vec<RemoteFile>> {
        let list: Result<ListResponse<RemoteFile>, _> = self.get("/files").await;
        optional(list).map(|list| list.data)
    }

    async fn attach_file(&self, index_id: &str, file_id: &str) -> RemoteResult<()> {
        let result: Result<serde_json::Value, _> = self
            .post(
                &format!("/vector_stores/{}/files", index_id),
                &AttachFileRequest { file_id },
            )
            .await;
        optional(result).map(|_| ())
    }

    async fn list_attached_files(&self, index_id: &str) -> RemoteResult<Vec<String>> {
        let list: Result<ListResponse<VectorStoreFile>, _> = self
            .get(&format!("/vector_stores/{}/files", index_id))
            .await;
        optional(list).map(|list| list.data.into_iter().map(|f| f.id).collect())
    }

    async fn detach_file(&self, index_id: &str, file_id: &str) -> RemoteResult<()> {
        let result: Result<serde_json::Value, _> = self
            .delete(&format!("/vector_stores/{}/files/{}", index_id, file_id))
            .await;
        optional(result).map(|_| ())
    }

    async fn probe_capabilities(&self) -> Capabilities {
        Capabilities {
            submit_tool_outputs: true,
            run_usage_listing: true,
            cancel_run: true,
            file_uploads: true,
            document_index: true,
        }
    }
}
