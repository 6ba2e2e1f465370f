//! Media processing tools exposed to the dispatch agent.
//!
//! Every tool takes a single string (a file path, or plain text for the
//! summarizer) and produces a single string (an output path or extracted
//! text). Tools never modify or delete their input.

mod catalog;
mod enhancer;
mod image_compressor;
mod ocr;
mod pool;
mod summarizer;
mod transcriber;
mod video_compressor;

pub use catalog::ToolCatalog;
pub use enhancer::EnhancerTool;
pub use image_compressor::{scaled_dimensions, ImageCompressorTool};
pub use ocr::{OcrEngine, OcrTool};
pub use pool::BlockingPool;
pub use summarizer::SummarizerTool;
pub use transcriber::{TranscriberTool, WhisperModel};
pub use video_compressor::VideoCompressorTool;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Name and description of a tool, as shown to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// A single media-processing capability.
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Name and description of this tool.
    fn spec(&self) -> &ToolSpec;

    /// Run the tool once on `input`.
    async fn execute(&self, input: &str) -> Result<String>;
}

/// Outcome of one tool execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Failure,
}

/// Result of executing a tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub status: ToolStatus,
    pub output: String,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Success,
            output: output.into(),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Failure,
            output: String::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }

    /// Text fed back to the model for this result.
    pub fn to_model_content(&self) -> String {
        match (&self.status, &self.error) {
            (ToolStatus::Success, _) if self.output.is_empty() => {
                "(the tool completed but produced no output)".to_string()
            }
            (ToolStatus::Success, _) => self.output.clone(),
            (ToolStatus::Failure, Some(error)) => format!("Tool error: {}", error),
            (ToolStatus::Failure, None) => "Tool error: unknown failure".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_result_model_content() {
        assert_eq!(ToolResult::success("out/a.png").to_model_content(), "out/a.png");
        assert_eq!(
            ToolResult::failure("decode error").to_model_content(),
            "Tool error: decode error"
        );
        assert!(ToolResult::success("").to_model_content().contains("no output"));
    }

    #[test]
    fn test_tool_result_serializes_lowercase_status() {
        let json = serde_json::to_value(ToolResult::failure("boom")).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["error"], "boom");
    }
}
