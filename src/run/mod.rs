//! Drives a single run to a terminal status
//!
//! The service only exposes run status by polling. The driver polls at a
//! fixed interval, answers tool-output requests with a placeholder, reads
//! token usage once the run completes and reports failures as [`RunError`].
//! Waiting is bounded by an optional deadline and an explicit cancel token.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::PollingConfig;
use crate::error::RunError;
use crate::llm::{AssistantApi, RemoteResult, Run, RunStatus, ToolOutput, Usage, UsageStrategy};

/// Output submitted for every tool call the service asks us to satisfy
pub const PLACEHOLDER_TOOL_OUTPUT: &str = "handled automatically";

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub interval: Duration,
    pub deadline: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

impl From<&PollingConfig> for PollSettings {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval(),
            deadline: config.deadline(),
        }
    }
}

/// Progress notifications emitted while a run is being driven
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum RunEvent {
    Polled { status: String },
    ToolOutputsSubmitted { count: usize },
    /// The service reported a status the driver does not recognise;
    /// polling continues
    UnknownStatus { status: String },
}

/// A run that reached `completed`
#[derive(Debug, Clone)]
pub struct CompletedRun {
    pub run: Run,
    /// `None` when neither usage source produced numbers
    pub usage: Option<Usage>,
    pub polls: usize,
}

pub struct RunDriver {
    api: Arc<dyn AssistantApi>,
    settings: PollSettings,
    usage_strategy: UsageStrategy,
}

impl RunDriver {
    pub fn new(api: Arc<dyn AssistantApi>, settings: PollSettings, usage_strategy: UsageStrategy) -> Self {
        Self {
            api,
            settings,
            usage_strategy,
        }
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    pub fn usage_strategy(&self) -> UsageStrategy {
        self.usage_strategy
    }

    /// Poll `run` until it completes, fails, times out or is cancelled.
    pub async fn drive(
        &self,
        thread_id: &str,
        run: Run,
        cancel: &CancellationToken,
        events: Option<&mpsc::UnboundedSender<RunEvent>>,
    ) -> Result<CompletedRun, RunError> {
        let started = Instant::now();
        let run_id = run.id.clone();
        let mut current = run;
        let mut polls = 0usize;
        let emit = |event: RunEvent| {
            if let Some(tx) = events {
                let _ = tx.send(event);
            }
        };

        loop {
            match &current.status {
                RunStatus::Completed => {
                    let usage = self.resolve_usage(thread_id, &current).await;
                    tracing::info!(run_id = %run_id, polls, "Run completed");
                    return Ok(CompletedRun {
                        run: current,
                        usage,
                        polls,
                    });
                }
                status if status.is_terminal_failure() => {
                    tracing::warn!(run_id = %run_id, status = %status, "Run ended without an answer");
                    return Err(RunError::Failed {
                        run_id,
                        status: status.clone(),
                        detail: current.error_detail(),
                    });
                }
                RunStatus::RequiresAction => {
                    let outputs: Vec<ToolOutput> = current
                        .pending_tool_calls()
                        .iter()
                        .map(|call| ToolOutput {
                            tool_call_id: call.id.clone(),
                            output: PLACEHOLDER_TOOL_OUTPUT.to_string(),
                        })
                        .collect();

                    if !outputs.is_empty() {
                        match self
                            .api
                            .submit_tool_outputs(thread_id, &run_id, &outputs)
                            .await
                        {
                            RemoteResult::Ok(_) => {
                                tracing::debug!(run_id = %run_id, count = outputs.len(), "Submitted placeholder tool outputs");
                                emit(RunEvent::ToolOutputsSubmitted {
                                    count: outputs.len(),
                                });
                            }
                            RemoteResult::Unsupported => {
                                return Err(RunError::ToolOutputsUnsupported { run_id });
                            }
                            RemoteResult::Failed(e) => return Err(RunError::Remote(e)),
                        }
                    }
                }
                RunStatus::Unknown(raw) => {
                    tracing::warn!(run_id = %run_id, status = %raw, "Unrecognised run status, still polling");
                    emit(RunEvent::UnknownStatus {
                        status: raw.clone(),
                    });
                }
                _ => {}
            }

            self.wait(&run_id, thread_id, started, cancel).await?;

            current = self.api.retrieve_run(thread_id, &run_id).await?;
            polls += 1;
            emit(RunEvent::Polled {
                status: current.status.to_string(),
            });
        }
    }

    /// Sleep one interval unless the deadline passes or the caller cancels
    async fn wait(
        &self,
        run_id: &str,
        thread_id: &str,
        started: Instant,
        cancel: &CancellationToken,
    ) -> Result<(), RunError> {
        let mut sleep_for = self.settings.interval;

        if let Some(deadline) = self.settings.deadline {
            let elapsed = started.elapsed();
            if elapsed >= deadline {
                self.abandon(thread_id, run_id).await;
                return Err(RunError::DeadlineExceeded {
                    run_id: run_id.to_string(),
                    waited: elapsed,
                });
            }
            sleep_for = sleep_for.min(deadline - elapsed);
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                self.abandon(thread_id, run_id).await;
                Err(RunError::Cancelled { run_id: run_id.to_string() })
            }
            _ = tokio::time::sleep(sleep_for) => Ok(()),
        }
    }

    /// Ask the service to stop a run we are no longer waiting for
    async fn abandon(&self, thread_id: &str, run_id: &str) {
        match self.api.cancel_run(thread_id, run_id).await {
            RemoteResult::Ok(_) => tracing::info!(run_id, "Requested remote run cancellation"),
            RemoteResult::Unsupported => {}
            RemoteResult::Failed(e) => {
                tracing::warn!(run_id, "Failed to cancel remote run: {}", e)
            }
        }
    }

    async fn resolve_usage(&self, thread_id: &str, run: &Run) -> Option<Usage> {
        if self.usage_strategy == UsageStrategy::RunSteps {
            match self.api.run_usage(thread_id, &run.id).await {
                RemoteResult::Ok(usage) => return Some(usage),
                RemoteResult::Unsupported => {
                    tracing::debug!(run_id = %run.id, "Usage listing unsupported, reading run record");
                }
                RemoteResult::Failed(e) => {
                    tracing::warn!(run_id = %run.id, "Usage listing failed, reading run record: {}", e);
                }
            }
        }

        if run.usage.is_none() {
            tracing::warn!(run_id = %run.id, "No token usage found for run");
        }
        run.usage
    }
}
