//! Optical character recognition via the tesseract CLI.

use super::{MediaTool, ToolSpec};
use crate::config::OcrSettings;
use crate::error::{MediaError, Result};
use crate::media::existing_file;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Process-wide handle to the OCR engine.
///
/// Created once at startup and shared by every OCR tool instance.
#[derive(Debug, Clone)]
pub struct OcrEngine {
    command: String,
    language: String,
}

impl OcrEngine {
    pub fn new(settings: &OcrSettings) -> Self {
        Self {
            command: settings.command.clone(),
            language: settings.language.clone(),
        }
    }

    /// Extract text from an image, one recognized line per output line.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn read_text(&self, path: &Path) -> Result<String> {
        let result = Command::new(&self.command)
            .arg(path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        let output = match result {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MediaError::ToolNotFound(self.command.clone()));
            }
            Err(e) => {
                return Err(MediaError::ToolFailed(format!("{} failed: {e}", self.command)));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::ToolFailed(format!("OCR failed: {}", stderr.trim())));
        }

        let text = normalize_lines(&String::from_utf8_lossy(&output.stdout));
        debug!("Recognized {} characters", text.len());
        Ok(text)
    }
}

/// Trim each line and drop blank ones.
fn normalize_lines(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extracts text from images.
pub struct OcrTool {
    spec: ToolSpec,
    engine: Arc<OcrEngine>,
}

impl OcrTool {
    pub fn new(engine: Arc<OcrEngine>) -> Self {
        Self {
            spec: ToolSpec::new(
                "OCR",
                "Extracts text from an image (English). Input: path to an image. \
                 Output: the recognized text, empty if none was found.",
            ),
            engine,
        }
    }
}

#[async_trait]
impl MediaTool for OcrTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, input: &str) -> Result<String> {
        let path = existing_file(input)?;
        let text = self.engine.read_text(&path).await?;
        info!("Extracted text from {}", path.display());
        Ok(text)
    }
}
