//! Request handling: stage one upload, run the agent, clean up.
//!
//! Coordinates a single request from uploaded bytes to the JSON-shaped
//! response. The staged copy is removed on every exit path, including a
//! write that fails partway.

use crate::agent::{AgentLoop, AgentRequest, OpenAIDispatcher, OutcomeStatus};
use crate::config::{MediaSettings, Settings};
use crate::error::{MediaError, Result};
use crate::media::{guess_mime, sanitize_file_name, MediaKind};
use crate::openai::create_client;
use crate::tools::ToolCatalog;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

/// Response body for one processed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub status: OutcomeStatus,
    pub instruction: String,
    /// Best-effort MIME type of the upload.
    pub file_type: String,
    pub result: String,
    /// Empty on success.
    pub message: String,
}

/// Response body for failures outside the agent loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: OutcomeStatus,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Error,
            message: message.into(),
        }
    }
}

/// A file in the staging directory, deleted when dropped.
struct StagedFile {
    path: PathBuf,
}

impl StagedFile {
    /// Claim `dir/file_name` and open it for writing.
    async fn create(dir: &Path, file_name: &str) -> Result<(Self, tokio::fs::File)> {
        tokio::fs::create_dir_all(dir).await?;
        // Guard first, so a failed open or write still cleans up
        let staged = Self {
            path: dir.join(file_name),
        };
        let file = tokio::fs::File::create(&staged.path).await?;
        Ok((staged, file))
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed staged file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove staged file {}: {}", self.path.display(), e),
        }
    }
}

/// An upload being streamed into staging.
///
/// Dropping it before [`Upload::finish`] removes whatever was written.
pub struct Upload {
    staged: StagedFile,
    file: tokio::fs::File,
    file_name: String,
    size: usize,
}

impl Upload {
    pub async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        self.file.write_all(chunk).await?;
        self.size += chunk.len();
        Ok(())
    }

    pub async fn finish(mut self) -> Result<StagedUpload> {
        self.file.flush().await?;
        debug!("Staged {} ({} bytes)", self.staged.path.display(), self.size);
        Ok(StagedUpload {
            file_type: guess_mime(&self.file_name),
            staged: self.staged,
            file_name: self.file_name,
        })
    }
}

/// A fully written upload, ready for the agent. Removed when dropped.
pub struct StagedUpload {
    staged: StagedFile,
    file_name: String,
    file_type: String,
}

impl StagedUpload {
    pub fn path(&self) -> &Path {
        &self.staged.path
    }
}

/// Accepts one file and one instruction per call and runs the agent on it.
pub struct RequestHandler {
    agent: AgentLoop,
    temp_dir: PathBuf,
    media: MediaSettings,
}

impl RequestHandler {
    /// Build the handler with the standard tool catalog and an OpenAI-backed agent.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = Arc::new(create_client()?);
        let catalog = Arc::new(ToolCatalog::register(settings, client.clone())?);
        let dispatcher = Arc::new(OpenAIDispatcher::new(client, &settings.agent));
        let agent = AgentLoop::new(dispatcher, catalog.clone(), &settings.agent);

        info!(
            "Request handler ready (agent model {}, {} tools)",
            settings.agent.model,
            catalog.len()
        );

        Ok(Self::new(agent, settings))
    }

    /// Build the handler around an existing agent.
    pub fn new(agent: AgentLoop, settings: &Settings) -> Self {
        Self {
            agent,
            temp_dir: settings.temp_dir(),
            media: settings.media.clone(),
        }
    }

    /// Start staging an upload under its sanitized base name.
    pub async fn begin_upload(&self, file_name: &str) -> Result<Upload> {
        let file_name = sanitize_file_name(file_name)?;
        let (staged, file) = StagedFile::create(&self.temp_dir, &file_name).await?;
        Ok(Upload {
            staged,
            file,
            file_name,
            size: 0,
        })
    }

    /// Run the agent on a staged upload, then remove it.
    ///
    /// Anything that goes wrong inside the agent comes back as an
    /// error-status response.
    #[instrument(skip_all, fields(file = %upload.file_name))]
    pub async fn process(&self, upload: StagedUpload, instruction: &str) -> ProcessResponse {
        let media_kind = MediaKind::from_path(upload.path(), &self.media);

        info!(
            "Processing {} as {} ({})",
            upload.file_name, upload.file_type, media_kind
        );

        let request = AgentRequest {
            instruction: instruction.to_string(),
            file_path: upload.path().display().to_string(),
            file_type: upload.file_type.clone(),
            media_kind,
        };

        let outcome = self.agent.run(&request).await;
        for call in &outcome.tool_calls {
            debug!("Tool call: {}", call);
        }

        ProcessResponse {
            status: outcome.status,
            instruction: instruction.to_string(),
            file_type: upload.file_type,
            result: outcome.result,
            message: outcome.message.unwrap_or_default(),
        }
    }

    /// Process an uploaded file held in memory.
    ///
    /// Errors are boundary failures only (bad file name, staging IO).
    pub async fn handle(
        &self,
        file_name: &str,
        bytes: &[u8],
        instruction: &str,
    ) -> Result<ProcessResponse> {
        let mut upload = self.begin_upload(file_name).await?;
        upload.write(bytes).await?;
        let staged = upload.finish().await?;
        Ok(self.process(staged, instruction).await)
    }

    /// Process a local file. The file is copied into staging and left untouched.
    pub async fn handle_path(&self, path: &Path, instruction: &str) -> Result<ProcessResponse> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                MediaError::InvalidInput(format!("Not a file path: {}", path.display()))
            })?
            .to_string();

        let mut source = tokio::fs::File::open(path).await?;
        let mut upload = self.begin_upload(&file_name).await?;
        upload.size = tokio::io::copy(&mut source, &mut upload.file).await? as usize;
        let staged = upload.finish().await?;
        Ok(self.process(staged, instruction).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ScriptedDispatcher;
    use crate::media::OutputDir;
    use crate::tools::{BlockingPool, ImageCompressorTool, MediaTool, TranscriberTool, WhisperModel};
    use image::GenericImageView;

    struct Fixture {
        _dir: tempfile::TempDir,
        settings: Settings,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let mut settings = Settings::default();
            settings.general.temp_dir = dir.path().join("temp").display().to_string();
            settings.general.output_dir = dir.path().join("output").display().to_string();
            settings.general.unique_output_names = false;
            Self { _dir: dir, settings }
        }

        fn staged(&self, name: &str) -> PathBuf {
            self.settings.temp_dir().join(name)
        }

        fn handler(
            &self,
            dispatcher: Arc<ScriptedDispatcher>,
            tools: Vec<Arc<dyn MediaTool>>,
        ) -> RequestHandler {
            let catalog = Arc::new(ToolCatalog::new(tools).unwrap());
            let agent = AgentLoop::new(dispatcher, catalog, &self.settings.agent);
            RequestHandler::new(agent, &self.settings)
        }

        fn image_compressor(&self) -> Arc<dyn MediaTool> {
            Arc::new(ImageCompressorTool::new(
                OutputDir::new(self.settings.output_dir(), false),
                BlockingPool::new(2),
                self.settings.image.clone(),
            ))
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            width,
            height,
            image::Rgb([120, 80, 40]),
        ));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[tokio::test]
    async fn test_compress_photo_end_to_end() {
        let fixture = Fixture::new();
        let staged = fixture.staged("photo.png");
        let expected = fixture.settings.output_dir().join("compressed_photo.png");

        let dispatcher = Arc::new(ScriptedDispatcher::new(vec![
            ScriptedDispatcher::call("call_1", "ImageCompressor", staged.to_str().unwrap()),
            ScriptedDispatcher::answer(expected.to_str().unwrap()),
        ]));
        let handler = fixture.handler(dispatcher.clone(), vec![fixture.image_compressor()]);

        let response = tokio_test::assert_ok!(
            handler
                .handle("photo.png", &png_bytes(2400, 1200), "compress this image")
                .await
        );

        assert_eq!(response.status, OutcomeStatus::Success);
        assert_eq!(response.file_type, "image/png");
        assert_eq!(response.instruction, "compress this image");
        assert_eq!(response.result, expected.display().to_string());
        assert_eq!(response.message, "");

        let output = image::open(&expected).unwrap();
        assert_eq!(output.dimensions(), (1920, 960));

        assert!(!staged.exists());

        // The model was told where the staged file lives
        let first = &dispatcher.seen()[0];
        assert!(first.turns()[1].content.contains(staged.to_str().unwrap()));
        assert!(first.turns()[1].content.contains("image/png (image)"));
    }

    #[tokio::test]
    async fn test_broken_video_reports_error() {
        let fixture = Fixture::new();
        let staged = fixture.staged("broken.mp4");

        let client = Arc::new(crate::openai::create_client().unwrap());
        let transcriber: Arc<dyn MediaTool> = Arc::new(TranscriberTool::new(
            Arc::new(WhisperModel::new(client, "whisper-1")),
            &fixture.settings.transcription,
        ));

        let dispatcher = Arc::new(ScriptedDispatcher::new(vec![
            ScriptedDispatcher::call("call_1", "Transcriber", staged.to_str().unwrap()),
            ScriptedDispatcher::answer("The file could not be transcribed."),
        ]));
        let handler = fixture.handler(dispatcher.clone(), vec![transcriber]);

        let response = handler
            .handle("broken.mp4", b"", "transcribe and summarize")
            .await
            .unwrap();

        assert_eq!(response.status, OutcomeStatus::Error);
        assert_eq!(response.file_type, "video/mp4");
        assert!(!response.message.is_empty());
        assert!(!staged.exists());

        let fed_back = dispatcher.seen()[1].last().unwrap().content.clone();
        assert!(fed_back.starts_with("Tool error:"));
    }

    #[tokio::test]
    async fn test_model_failure_still_cleans_up() {
        let fixture = Fixture::new();
        let dispatcher = Arc::new(ScriptedDispatcher::new(vec![Err(MediaError::OpenAI(
            "invalid api key".into(),
        ))]));
        let handler = fixture.handler(dispatcher, vec![fixture.image_compressor()]);

        let response = handler.handle("notes.txt", b"hello", "summarize").await.unwrap();

        assert_eq!(response.status, OutcomeStatus::Error);
        assert_eq!(response.result, "");
        assert!(response.message.contains("invalid api key"));
        assert!(!fixture.staged("notes.txt").exists());
    }

    #[tokio::test]
    async fn test_upload_name_is_reduced_to_basename() {
        let fixture = Fixture::new();
        let dispatcher = Arc::new(ScriptedDispatcher::new(vec![ScriptedDispatcher::answer("ok")]));
        let handler = fixture.handler(dispatcher.clone(), vec![fixture.image_compressor()]);

        let response = handler
            .handle("../../etc/blob", b"data", "what is this?")
            .await
            .unwrap();

        assert_eq!(response.file_type, "application/octet-stream");
        let user_turn = dispatcher.seen()[0].turns()[1].content.clone();
        assert!(user_turn.contains(fixture.staged("blob").to_str().unwrap()));
    }

    #[tokio::test]
    async fn test_invalid_file_name_is_boundary_error() {
        let fixture = Fixture::new();
        let dispatcher = Arc::new(ScriptedDispatcher::new(vec![]));
        let handler = fixture.handler(dispatcher.clone(), vec![fixture.image_compressor()]);

        let result = handler.handle("..", b"data", "anything").await;
        assert!(matches!(result, Err(MediaError::InvalidInput(_))));
        assert!(dispatcher.seen().is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_upload_is_removed() {
        let fixture = Fixture::new();
        let dispatcher = Arc::new(ScriptedDispatcher::new(vec![]));
        let handler = fixture.handler(dispatcher.clone(), vec![fixture.image_compressor()]);

        let mut upload = handler.begin_upload("movie.mp4").await.unwrap();
        upload.write(&[0u8; 4096]).await.unwrap();
        assert!(fixture.staged("movie.mp4").exists());

        // The stream broke before the last chunk
        drop(upload);

        assert!(!fixture.staged("movie.mp4").exists());
        assert!(dispatcher.seen().is_empty());
    }

    #[tokio::test]
    async fn test_staged_upload_is_removed_if_never_processed() {
        let fixture = Fixture::new();
        let dispatcher = Arc::new(ScriptedDispatcher::new(vec![]));
        let handler = fixture.handler(dispatcher, vec![fixture.image_compressor()]);

        let mut upload = handler.begin_upload("photo.png").await.unwrap();
        upload.write(b"first").await.unwrap();
        upload.write(b"second").await.unwrap();
        let staged = upload.finish().await.unwrap();

        assert_eq!(std::fs::read(staged.path()).unwrap(), b"firstsecond");
        drop(staged);
        assert!(!fixture.staged("photo.png").exists());
    }

    #[tokio::test]
    async fn test_handle_path_keeps_source() {
        let fixture = Fixture::new();
        let source_dir = tempfile::tempdir().unwrap();
        let source = source_dir.path().join("clip.wav");
        std::fs::write(&source, b"RIFF").unwrap();

        let dispatcher = Arc::new(ScriptedDispatcher::new(vec![ScriptedDispatcher::answer("ok")]));
        let handler = fixture.handler(dispatcher, vec![fixture.image_compressor()]);

        let response = handler.handle_path(&source, "transcribe").await.unwrap();
        assert_eq!(response.status, OutcomeStatus::Success);
        assert!(source.exists());
        assert!(!fixture.staged("clip.wav").exists());
    }

    #[test]
    fn test_response_serializes_five_keys() {
        let response = ProcessResponse {
            status: OutcomeStatus::Success,
            instruction: "compress".into(),
            file_type: "image/png".into(),
            result: "output/compressed_a.png".into(),
            message: String::new(),
        };
        let value = serde_json::to_value(&response).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 5);
        assert_eq!(value["status"], "success");
        assert_eq!(value["message"], "");

        let error = serde_json::to_value(ErrorResponse::new("disk full")).unwrap();
        assert_eq!(error, serde_json::json!({"status": "error", "message": "disk full"}));
    }
}
