//! Text summarization with a chat model.

use super::{MediaTool, ToolSpec};
use crate::config::{render, SummarizerSettings};
use crate::error::{MediaError, Result};
use crate::openai::OpenAIClient;
use async_openai::types::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Summarizes text content using an LLM.
pub struct SummarizerTool {
    spec: ToolSpec,
    client: Arc<OpenAIClient>,
    settings: SummarizerSettings,
}

impl SummarizerTool {
    pub fn new(client: Arc<OpenAIClient>, settings: SummarizerSettings) -> Self {
        Self {
            spec: ToolSpec::new(
                "LLMSummarizer",
                "Summarizes text content. Input: the text itself (not a file path). \
                 Output: a concise summary.",
            ),
            client,
            settings,
        }
    }

    /// The full prompt sent for `text`.
    fn build_prompt(&self, text: &str) -> String {
        let mut vars = HashMap::new();
        vars.insert("text", text);
        render(&self.settings.prompt, &vars)
    }
}

#[async_trait]
impl MediaTool for SummarizerTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    #[instrument(skip(self, input), fields(tool = %self.spec.name, chars = input.len()))]
    async fn execute(&self, input: &str) -> Result<String> {
        if input.trim().is_empty() {
            return Err(MediaError::InvalidInput("No text to summarize".to_string()));
        }

        debug!("Summarizing {} characters", input.len());

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.settings.model)
            .temperature(self.settings.temperature)
            .messages(vec![ChatCompletionRequestUserMessageArgs::default()
                .content(self.build_prompt(input))
                .build()
                .map_err(|e| MediaError::OpenAI(e.to_string()))?
                .into()])
            .build()
            .map_err(|e| MediaError::OpenAI(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| MediaError::OpenAI(format!("Summarization API error: {}", e)))?;

        let summary = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| MediaError::OpenAI("Empty summarization response".to_string()))?;

        info!("Generated summary");
        Ok(summary.trim().to_string())
    }
}
