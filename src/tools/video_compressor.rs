//! Video compression via ffmpeg.

use super::{MediaTool, ToolSpec};
use crate::config::VideoSettings;
use crate::error::Result;
use crate::media::{existing_file, ffmpeg, OutputDir};
use async_trait::async_trait;
use tracing::{info, instrument};

/// Re-encodes videos with a fixed quality target and container.
pub struct VideoCompressorTool {
    spec: ToolSpec,
    output: OutputDir,
    settings: VideoSettings,
}

impl VideoCompressorTool {
    pub fn new(output: OutputDir, settings: VideoSettings) -> Self {
        Self {
            spec: ToolSpec::new(
                "VideoCompressor",
                "Compresses a video file using ffmpeg. Input: path to a video. \
                 Output: path to the compressed video.",
            ),
            output,
            settings,
        }
    }
}

#[async_trait]
impl MediaTool for VideoCompressorTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    #[instrument(skip(self), fields(tool = %self.spec.name))]
    async fn execute(&self, input: &str) -> Result<String> {
        let input_path = existing_file(input)?;
        let output_path =
            self.output
                .path_for("compressed", &input_path, Some(&self.settings.container))?;

        ffmpeg::compress_video(&input_path, &output_path, &self.settings).await?;

        info!("Compressed video to {}", output_path.display());
        Ok(output_path.display().to_string())
    }
}
