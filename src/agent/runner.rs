//! The agent loop: alternate model queries and tool executions until done.

use super::dispatcher::{ModelDispatcher, ModelReply};
use super::transcript::{ToolInvocation, Transcript};
use crate::config::AgentSettings;
use crate::media::MediaKind;
use crate::tools::{ToolCatalog, ToolResult, ToolSpec, ToolStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Input for one agent run.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub instruction: String,
    pub file_path: String,
    /// MIME type guessed from the file name.
    pub file_type: String,
    pub media_kind: MediaKind,
}

impl AgentRequest {
    /// The user turn that opens the conversation.
    pub fn user_message(&self) -> String {
        format!(
            "{}\nFile path: {}\nFile type: {} ({})",
            self.instruction, self.file_path, self.file_type, self.media_kind
        )
    }
}

/// Terminal status of an agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Error,
}

/// Final result of an agent run. Always produced, never an error.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub status: OutcomeStatus,
    pub result: String,
    pub message: Option<String>,
    /// Every tool call made, in order.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Number of model queries issued.
    pub iterations: usize,
}

impl AgentOutcome {
    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// Record of a tool call made by the agent.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    pub name: String,
    pub input: String,
    pub result: ToolResult,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self.result.status {
            ToolStatus::Success => "ok",
            ToolStatus::Failure => "failed",
        };
        write!(f, "{}({}) -> {}", self.name, self.input, status)
    }
}

/// Where the loop is.
#[derive(Debug)]
enum LoopState {
    AwaitingModel,
    ExecutingTool(ToolInvocation),
    Done(String),
    Failed(String),
}

/// Drives the model through tool calls for a single request.
///
/// Holds no per-request state; each [`AgentLoop::run`] owns its transcript.
pub struct AgentLoop {
    dispatcher: Arc<dyn ModelDispatcher>,
    catalog: Arc<ToolCatalog>,
    specs: Vec<ToolSpec>,
    system_prompt: String,
    max_iterations: usize,
    tool_timeout: Duration,
}

impl AgentLoop {
    pub fn new(
        dispatcher: Arc<dyn ModelDispatcher>,
        catalog: Arc<ToolCatalog>,
        settings: &AgentSettings,
    ) -> Self {
        let specs = catalog.specs();
        let system_prompt = system_prompt_with_tools(&settings.system_prompt, &specs);

        Self {
            dispatcher,
            catalog,
            specs,
            system_prompt,
            max_iterations: settings.max_iterations.max(1),
            tool_timeout: Duration::from_secs(settings.tool_timeout_seconds.max(1)),
        }
    }

    /// Run the loop to completion.
    pub async fn run(&self, request: &AgentRequest) -> AgentOutcome {
        let mut transcript = Transcript::new();
        transcript.push_system(self.system_prompt.clone());
        transcript.push_user(request.user_message());

        let mut tool_calls: Vec<ToolCallRecord> = Vec::new();
        let mut iterations = 0;
        let mut state = LoopState::AwaitingModel;

        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    if iterations >= self.max_iterations {
                        LoopState::Failed(format!(
                            "Agent exceeded maximum iterations ({})",
                            self.max_iterations
                        ))
                    } else {
                        iterations += 1;
                        debug!("Agent iteration {}", iterations);

                        match self.dispatcher.send(&transcript, &self.specs).await {
                            Ok(ModelReply::ToolCall(invocation)) => {
                                transcript.push_tool_call(invocation.clone());
                                LoopState::ExecutingTool(invocation)
                            }
                            Ok(ModelReply::Final(content)) => {
                                transcript.push_assistant(content.clone());
                                LoopState::Done(content)
                            }
                            Err(e) => LoopState::Failed(e.to_string()),
                        }
                    }
                }

                LoopState::ExecutingTool(invocation) => {
                    info!(
                        "Agent calling tool: {} with input: {}",
                        invocation.tool_name, invocation.input
                    );

                    let result = self
                        .catalog
                        .invoke(&invocation.tool_name, &invocation.input, self.tool_timeout)
                        .await;

                    transcript.push_tool_result(&invocation.id, result.to_model_content());
                    tool_calls.push(ToolCallRecord {
                        name: invocation.tool_name,
                        input: invocation.input,
                        result,
                    });

                    LoopState::AwaitingModel
                }

                LoopState::Done(content) => {
                    let outcome = finish(content, tool_calls, iterations);
                    info!(
                        "Agent finished with {:?} after {} iteration(s), {} tool call(s)",
                        outcome.status,
                        outcome.iterations,
                        outcome.tool_calls.len()
                    );
                    return outcome;
                }

                LoopState::Failed(message) => {
                    error!("Agent run failed: {}", message);
                    return AgentOutcome {
                        status: OutcomeStatus::Error,
                        result: String::new(),
                        message: Some(message),
                        tool_calls,
                        iterations,
                    };
                }
            };
        }
    }
}

/// Build the outcome for a final answer.
///
/// A run whose tool calls all failed is an error even though the model answered.
fn finish(content: String, tool_calls: Vec<ToolCallRecord>, iterations: usize) -> AgentOutcome {
    let all_failed =
        !tool_calls.is_empty() && tool_calls.iter().all(|c| !c.result.is_success());

    if all_failed {
        let message = tool_calls
            .last()
            .and_then(|c| c.result.error.clone())
            .unwrap_or_else(|| "All tool calls failed".to_string());

        return AgentOutcome {
            status: OutcomeStatus::Error,
            result: content,
            message: Some(message),
            tool_calls,
            iterations,
        };
    }

    AgentOutcome {
        status: OutcomeStatus::Success,
        result: content,
        message: None,
        tool_calls,
        iterations,
    }
}

/// Append the tool catalog to the base system prompt.
fn system_prompt_with_tools(base: &str, specs: &[ToolSpec]) -> String {
    let listing = specs
        .iter()
        .map(|s| format!("- {}: {}", s.name, s.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!("{}\n\nAvailable tools:\n{}", base.trim_end(), listing)
}
