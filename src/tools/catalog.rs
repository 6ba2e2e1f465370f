//! The fixed catalog of tools available to the agent.

use super::{
    BlockingPool, EnhancerTool, ImageCompressorTool, MediaTool, OcrEngine, OcrTool,
    SummarizerTool, ToolResult, ToolSpec, TranscriberTool, VideoCompressorTool, WhisperModel,
};
use crate::config::Settings;
use crate::error::{MediaError, Result};
use crate::media::OutputDir;
use crate::openai::OpenAIClient;
use futures::FutureExt;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Immutable list of tools, built once per process and shared by all requests.
pub struct ToolCatalog {
    tools: Vec<Arc<dyn MediaTool>>,
}

impl ToolCatalog {
    /// Build a catalog from explicit tools. Names must be unique.
    pub fn new(tools: Vec<Arc<dyn MediaTool>>) -> Result<Self> {
        let mut seen = HashSet::new();
        for tool in &tools {
            if !seen.insert(tool.spec().name.clone()) {
                return Err(MediaError::Config(format!(
                    "Duplicate tool name: {}",
                    tool.spec().name
                )));
            }
        }
        Ok(Self { tools })
    }

    /// Build the standard six tools from settings.
    ///
    /// Heavy handles (OCR engine, transcription model) are created here once
    /// and injected into the tools that use them.
    pub fn register(settings: &Settings, client: Arc<OpenAIClient>) -> Result<Self> {
        let output = OutputDir::new(settings.output_dir(), settings.general.unique_output_names);
        let pool = BlockingPool::new(settings.workers.max_blocking);

        let ocr_engine = Arc::new(OcrEngine::new(&settings.ocr));
        let whisper = Arc::new(WhisperModel::new(client.clone(), &settings.transcription.model));

        let catalog = Self::new(vec![
            Arc::new(OcrTool::new(ocr_engine)),
            Arc::new(TranscriberTool::new(whisper, &settings.transcription)),
            Arc::new(VideoCompressorTool::new(output.clone(), settings.video.clone())),
            Arc::new(ImageCompressorTool::new(
                output.clone(),
                pool.clone(),
                settings.image.clone(),
            )),
            Arc::new(EnhancerTool::new(output, pool)),
            Arc::new(SummarizerTool::new(client, settings.summarizer.clone())),
        ])?;

        info!("Registered {} tools", catalog.len());
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool specs in registration order.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec().clone()).collect()
    }

    /// Look up a tool by exact name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn MediaTool>> {
        self.tools.iter().find(|t| t.spec().name == name)
    }

    /// Run one tool by name, converting every failure mode into a [`ToolResult`].
    ///
    /// Unknown names, tool errors, timeouts and panics all come back as
    /// failures so the caller can report them to the model.
    pub async fn invoke(&self, name: &str, input: &str, timeout: Duration) -> ToolResult {
        let Some(tool) = self.get(name) else {
            let available = self
                .tools
                .iter()
                .map(|t| t.spec().name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            warn!("Model requested unknown tool: {}", name);
            return ToolResult::failure(format!(
                "{}. Available tools: {}",
                MediaError::UnknownTool(name.to_string()),
                available
            ));
        };

        let call = AssertUnwindSafe(tool.execute(input)).catch_unwind();

        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(Ok(output))) => ToolResult::success(output),
            Ok(Ok(Err(e))) => {
                warn!("Tool {} failed: {}", name, e);
                ToolResult::failure(e.to_string())
            }
            Ok(Err(_)) => {
                warn!("Tool {} panicked", name);
                ToolResult::failure(format!("Tool '{}' crashed", name))
            }
            Err(_) => {
                let e = MediaError::ToolTimeout(name.to_string(), timeout.as_secs());
                warn!("{}", e);
                ToolResult::failure(e.to_string())
            }
        }
    }
}
