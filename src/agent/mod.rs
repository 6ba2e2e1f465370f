//! Agent system for routing a media request through tool calls.
//!
//! An LLM is shown the tool catalog and the user's instruction, then asked
//! turn by turn to either call a tool or give a final answer. Tool failures
//! are reported back so the model can correct itself; model failures end
//! the run.

mod dispatcher;
mod runner;
mod transcript;

pub use dispatcher::{ModelDispatcher, ModelReply, OpenAIDispatcher};
pub use runner::{AgentLoop, AgentOutcome, AgentRequest, OutcomeStatus, ToolCallRecord};
pub use transcript::{ConversationTurn, Role, ToolInvocation, Transcript};

#[cfg(test)]
pub(crate) use dispatcher::scripted::ScriptedDispatcher;
