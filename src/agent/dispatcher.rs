//! Model dispatchers: the seam between the agent loop and an LLM provider.

use super::transcript::{Role, ToolInvocation, Transcript};
use crate::config::AgentSettings;
use crate::error::{MediaError, Result};
use crate::openai::OpenAIClient;
use crate::tools::ToolSpec;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionTool, ChatCompletionToolType, CreateChatCompletionRequestArgs, FunctionCall,
    FunctionObject,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// What the model wants next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelReply {
    /// Run one tool and report back.
    ToolCall(ToolInvocation),
    /// Final answer; the run is over.
    Final(String),
}

/// Sends a transcript to a language model and interprets its reply.
#[async_trait]
pub trait ModelDispatcher: Send + Sync {
    async fn send(&self, transcript: &Transcript, tools: &[ToolSpec]) -> Result<ModelReply>;
}

/// Dispatcher backed by the OpenAI chat completions tool-calling API.
pub struct OpenAIDispatcher {
    client: Arc<OpenAIClient>,
    model: String,
    temperature: f32,
}

impl OpenAIDispatcher {
    pub fn new(client: Arc<OpenAIClient>, settings: &AgentSettings) -> Self {
        Self {
            client,
            model: settings.model.clone(),
            temperature: settings.temperature,
        }
    }
}

#[async_trait]
impl ModelDispatcher for OpenAIDispatcher {
    async fn send(&self, transcript: &Transcript, tools: &[ToolSpec]) -> Result<ModelReply> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(self.temperature)
            .messages(to_messages(transcript)?)
            .tools(tool_definitions(tools))
            .parallel_tool_calls(false)
            .build()
            .map_err(|e| MediaError::Agent(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| MediaError::OpenAI(format!("Agent API error: {}", e)))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| MediaError::Agent("No response from model".to_string()))?;

        let mut calls = choice.message.tool_calls.unwrap_or_default().into_iter();
        match calls.next() {
            Some(call) => {
                if calls.len() > 0 {
                    warn!("Model requested {} extra tool calls; running only the first", calls.len());
                }
                debug!("Model requested tool {}", call.function.name);
                Ok(ModelReply::ToolCall(ToolInvocation::new(
                    call.id,
                    call.function.name,
                    parse_tool_input(&call.function.arguments),
                )))
            }
            None => Ok(ModelReply::Final(choice.message.content.unwrap_or_default())),
        }
    }
}

/// Every tool takes one string argument named `input`.
fn tool_definitions(tools: &[ToolSpec]) -> Vec<ChatCompletionTool> {
    tools
        .iter()
        .map(|spec| ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: spec.name.clone(),
                description: Some(spec.description.clone()),
                parameters: Some(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "input": {
                            "type": "string",
                            "description": "File path or text to process"
                        }
                    },
                    "required": ["input"]
                })),
                strict: None,
            },
        })
        .collect()
}

/// Pull the `input` string out of the call arguments.
///
/// Falls back to the raw argument text when it is not the expected JSON shape.
fn parse_tool_input(arguments: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(arguments) {
        Ok(serde_json::Value::Object(map)) => match map.get("input") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => map
                .values()
                .find_map(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
        },
        Ok(serde_json::Value::String(s)) => s,
        _ => arguments.to_string(),
    }
}

/// Convert the transcript into chat completion messages.
fn to_messages(transcript: &Transcript) -> Result<Vec<ChatCompletionRequestMessage>> {
    let build_err = |e: async_openai::error::OpenAIError| MediaError::Agent(e.to_string());

    transcript
        .turns()
        .iter()
        .map(|turn| -> Result<ChatCompletionRequestMessage> {
            Ok(match (turn.role, &turn.tool_call) {
                (Role::System, _) => ChatCompletionRequestSystemMessageArgs::default()
                    .content(turn.content.clone())
                    .build()
                    .map_err(build_err)?
                    .into(),
                (Role::User, _) => ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.content.clone())
                    .build()
                    .map_err(build_err)?
                    .into(),
                (Role::Assistant, Some(call)) => ChatCompletionRequestAssistantMessageArgs::default()
                    .tool_calls(vec![ChatCompletionMessageToolCall {
                        id: call.id.clone(),
                        r#type: ChatCompletionToolType::Function,
                        function: FunctionCall {
                            name: call.tool_name.clone(),
                            arguments: serde_json::json!({ "input": call.input }).to_string(),
                        },
                    }])
                    .build()
                    .map_err(build_err)?
                    .into(),
                (Role::Assistant, None) => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.content.clone())
                    .build()
                    .map_err(build_err)?
                    .into(),
                (Role::ToolResult, _) => ChatCompletionRequestToolMessageArgs::default()
                    .tool_call_id(turn.tool_call_id.clone().unwrap_or_default())
                    .content(turn.content.clone())
                    .build()
                    .map_err(build_err)?
                    .into(),
            })
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod scripted {
    //! Queue-driven dispatcher for tests.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays queued replies in order and records every transcript it sees.
    #[derive(Default)]
    pub struct ScriptedDispatcher {
        replies: Mutex<VecDeque<Result<ModelReply>>>,
        seen: Mutex<Vec<Transcript>>,
    }

    impl ScriptedDispatcher {
        pub fn new(replies: Vec<Result<ModelReply>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub fn call(id: &str, tool: &str, input: &str) -> Result<ModelReply> {
            Ok(ModelReply::ToolCall(ToolInvocation::new(id, tool, input)))
        }

        pub fn answer(text: &str) -> Result<ModelReply> {
            Ok(ModelReply::Final(text.to_string()))
        }

        /// Transcripts received so far, one per query.
        pub fn seen(&self) -> Vec<Transcript> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ModelDispatcher for ScriptedDispatcher {
        async fn send(&self, transcript: &Transcript, _tools: &[ToolSpec]) -> Result<ModelReply> {
            self.seen.lock().unwrap().push(transcript.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(MediaError::Agent("script exhausted".to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tool_input() {
        assert_eq!(parse_tool_input(r#"{"input": "temp/a.png"}"#), "temp/a.png");
        assert_eq!(parse_tool_input(r#"{"path": "temp/a.png"}"#), "temp/a.png");
        assert_eq!(parse_tool_input(r#""raw string""#), "raw string");
        assert_eq!(parse_tool_input("temp/a.png"), "temp/a.png");
        assert_eq!(parse_tool_input(r#"{"input": 42}"#), "42");
    }

    #[test]
    fn test_tool_definitions_follow_catalog() {
        let defs = tool_definitions(&[
            ToolSpec::new("OCR", "reads text"),
            ToolSpec::new("Enhancer", "improves images"),
        ]);
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].function.name, "OCR");
        assert_eq!(defs[1].function.description.as_deref(), Some("improves images"));
        assert_eq!(
            defs[0].function.parameters.as_ref().unwrap()["required"][0],
            "input"
        );
    }

    #[test]
    fn test_transcript_converts_to_messages() {
        let mut transcript = Transcript::new();
        transcript.push_system("sys");
        transcript.push_user("do it");
        transcript.push_tool_call(ToolInvocation::new("call_1", "OCR", "a.png"));
        transcript.push_tool_result("call_1", "HELLO");
        transcript.push_assistant("The image says HELLO");

        let messages = to_messages(&transcript).unwrap();
        assert_eq!(messages.len(), 5);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::User(_)));
        match &messages[2] {
            ChatCompletionRequestMessage::Assistant(msg) => {
                let calls = msg.tool_calls.as_ref().unwrap();
                assert_eq!(calls[0].id, "call_1");
                assert_eq!(calls[0].function.name, "OCR");
            }
            other => panic!("Expected assistant message, got {:?}", other),
        }
        match &messages[3] {
            ChatCompletionRequestMessage::Tool(msg) => assert_eq!(msg.tool_call_id, "call_1"),
            other => panic!("Expected tool message, got {:?}", other),
        }
    }
}
