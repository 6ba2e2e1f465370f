//! Conversation transcript for one agent run.

use serde::{Deserialize, Serialize};

/// Speaker of a transcript turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    ToolResult,
}

/// A request from the model to run one tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Provider-assigned call id, echoed back with the result.
    pub id: String,
    pub tool_name: String,
    pub input: String,
}

impl ToolInvocation {
    pub fn new(id: impl Into<String>, tool_name: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            input: input.into(),
        }
    }
}

/// One entry in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    /// Set on assistant turns that requested a tool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolInvocation>,
    /// Set on tool-result turns; matches the invocation id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Append-only conversation history.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<ConversationTurn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_system(&mut self, content: impl Into<String>) {
        self.push(Role::System, content.into(), None, None);
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Role::User, content.into(), None, None);
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Role::Assistant, content.into(), None, None);
    }

    pub fn push_tool_call(&mut self, invocation: ToolInvocation) {
        self.push(Role::Assistant, String::new(), Some(invocation), None);
    }

    pub fn push_tool_result(&mut self, call_id: &str, content: impl Into<String>) {
        self.push(Role::ToolResult, content.into(), None, Some(call_id.to_string()));
    }

    fn push(
        &mut self,
        role: Role,
        content: String,
        tool_call: Option<ToolInvocation>,
        tool_call_id: Option<String>,
    ) {
        self.turns.push(ConversationTurn {
            role,
            content,
            tool_call,
            tool_call_id,
        });
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }
}
