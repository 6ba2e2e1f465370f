//! Audio/video transcription with OpenAI Whisper.

use super::{MediaTool, ToolSpec};
use crate::config::TranscriptionSettings;
use crate::error::{MediaError, Result};
use crate::media::{existing_file, ffmpeg};
use crate::openai::OpenAIClient;
use async_openai::types::{AudioInput, AudioResponseFormat, CreateTranscriptionRequestArgs};
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Audio formats the Whisper API accepts without conversion.
const DIRECT_AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a"];

/// Process-wide handle to the transcription model.
///
/// Created once at startup and shared by every transcriber instance.
pub struct WhisperModel {
    client: Arc<OpenAIClient>,
    model: String,
}

impl WhisperModel {
    pub fn new(client: Arc<OpenAIClient>, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }

    /// Transcribe one audio file in a single API call. Language is auto-detected.
    #[instrument(skip_all, fields(audio_path = %audio_path.display()))]
    pub async fn transcribe_file(&self, audio_path: &Path) -> Result<String> {
        let file_bytes = tokio::fs::read(audio_path).await?;
        if file_bytes.is_empty() {
            return Err(MediaError::Transcription(format!(
                "Audio file is empty: {}",
                audio_path.display()
            )));
        }

        let request = CreateTranscriptionRequestArgs::default()
            .file(AudioInput::from_vec_u8(
                audio_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("audio.mp3")
                    .to_string(),
                file_bytes,
            ))
            .model(&self.model)
            .response_format(AudioResponseFormat::Json)
            .build()
            .map_err(|e| MediaError::Transcription(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .audio()
            .transcribe(request)
            .await
            .map_err(|e| MediaError::OpenAI(format!("Whisper API error: {}", e)))?;

        Ok(response.text.trim().to_string())
    }
}

/// Transcribes audio and video files to text.
pub struct TranscriberTool {
    spec: ToolSpec,
    model: Arc<WhisperModel>,
    chunk_duration_seconds: u32,
    max_concurrent_chunks: usize,
}

impl TranscriberTool {
    pub fn new(model: Arc<WhisperModel>, settings: &TranscriptionSettings) -> Self {
        Self {
            spec: ToolSpec::new(
                "Transcriber",
                "Transcribes speech in an audio or video file to text using Whisper. \
                 Input: path to an audio or video file. Output: the transcript.",
            ),
            model,
            chunk_duration_seconds: settings.chunk_duration_seconds,
            max_concurrent_chunks: settings.max_concurrent_chunks.max(1),
        }
    }

    /// Bring the input into an API-friendly audio file inside `scratch`.
    async fn prepare_audio(&self, input: &Path, scratch: &Path) -> Result<PathBuf> {
        if needs_extraction(input) {
            let audio = scratch.join("audio.mp3");
            ffmpeg::extract_audio(input, &audio).await?;
            Ok(audio)
        } else {
            Ok(input.to_path_buf())
        }
    }
}

/// Whether the audio track must be extracted before upload.
fn needs_extraction(path: &Path) -> bool {
    !path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| DIRECT_AUDIO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[async_trait]
impl MediaTool for TranscriberTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    #[instrument(skip(self), fields(tool = %self.spec.name))]
    async fn execute(&self, input: &str) -> Result<String> {
        let input_path = existing_file(input)?;

        // Scratch files go away when this is dropped
        let scratch = tempfile::tempdir()?;
        let audio = self.prepare_audio(&input_path, scratch.path()).await?;
        let chunks =
            ffmpeg::split_audio(&audio, &scratch.path().join("chunks"), self.chunk_duration_seconds)
                .await?;

        debug!("Transcribing {} chunk(s)", chunks.len());

        let model = self.model.clone();
        let parts: Vec<String> = stream::iter(chunks)
            .map(move |chunk| {
                let model = model.clone();
                async move { model.transcribe_file(&chunk).await }
            })
            .buffered(self.max_concurrent_chunks)
            .try_collect()
            .await?;

        let transcript = parts
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        info!("Transcribed {}", input_path.display());
        Ok(transcript)
    }
}
