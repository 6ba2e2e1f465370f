//! Configuration settings for smartmedia.

use super::prompts::{AGENT_SYSTEM_PROMPT, SUMMARIZE_PROMPT};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub agent: AgentSettings,
    pub summarizer: SummarizerSettings,
    pub transcription: TranscriptionSettings,
    pub ocr: OcrSettings,
    pub video: VideoSettings,
    pub image: ImageSettings,
    pub media: MediaSettings,
    pub server: ServerSettings,
    pub workers: WorkerSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory where uploads are staged for the duration of one request.
    pub temp_dir: String,
    /// Directory where tools write their output artifacts.
    pub output_dir: String,
    /// Insert a per-invocation id into output file names.
    pub unique_output_names: bool,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            temp_dir: "temp".to_string(),
            output_dir: "output".to_string(),
            unique_output_names: true,
            log_level: "info".to_string(),
        }
    }
}

/// Agent loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Chat model that selects tools.
    pub model: String,
    pub temperature: f32,
    /// Maximum number of model queries per request.
    pub max_iterations: usize,
    /// Upper bound on a single tool invocation.
    pub tool_timeout_seconds: u64,
    pub system_prompt: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4-turbo-preview".to_string(),
            temperature: 0.0,
            max_iterations: 15,
            tool_timeout_seconds: 600,
            system_prompt: AGENT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// Text summarization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerSettings {
    pub model: String,
    pub temperature: f32,
    /// Prompt template; `{{text}}` is replaced with the input.
    pub prompt: String,
}

impl Default for SummarizerSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4-turbo-preview".to_string(),
            temperature: 0.3,
            prompt: SUMMARIZE_PROMPT.to_string(),
        }
    }
}

/// Transcription service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    /// Whisper model to use.
    pub model: String,
    /// Duration in seconds for splitting long audio files.
    pub chunk_duration_seconds: u32,
    /// Maximum concurrent chunk transcriptions.
    pub max_concurrent_chunks: usize,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            model: "whisper-1".to_string(),
            chunk_duration_seconds: 600,
            max_concurrent_chunks: 2,
        }
    }
}

/// OCR engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// OCR executable.
    pub command: String,
    /// Recognition language.
    pub language: String,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            command: "tesseract".to_string(),
            language: "eng".to_string(),
        }
    }
}

/// Video re-encoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    pub codec: String,
    pub audio_codec: String,
    pub preset: String,
    /// Constant rate factor (0-51, lower is better).
    pub crf: u8,
    pub audio_bitrate: String,
    /// Container extension for compressed output.
    pub container: String,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            preset: "medium".to_string(),
            crf: 23,
            audio_bitrate: "128k".to_string(),
            container: "mp4".to_string(),
        }
    }
}

/// Image compression settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    /// Longest allowed edge in pixels.
    pub max_dimension: u32,
    /// JPEG quality (1-100).
    pub quality: u8,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            max_dimension: 1920,
            quality: 85,
        }
    }
}

/// Recognized media extensions. Used for type hints only, never for rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaSettings {
    pub image_extensions: Vec<String>,
    pub audio_extensions: Vec<String>,
    pub video_extensions: Vec<String>,
}

impl Default for MediaSettings {
    fn default() -> Self {
        let list = |exts: &[&str]| exts.iter().map(|e| e.to_string()).collect();
        Self {
            image_extensions: list(&[".jpg", ".jpeg", ".png", ".bmp"]),
            audio_extensions: list(&[".mp3", ".wav", ".m4a"]),
            video_extensions: list(&[".mp4", ".avi", ".mov"]),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body in bytes.
    pub max_upload_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_upload_bytes: 512 * 1024 * 1024,
        }
    }
}

/// Worker pool for CPU-bound tool work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Maximum number of concurrently running blocking jobs.
    pub max_blocking: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self { max_blocking: 4 }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("smartmedia")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded staging directory path.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    /// Get the expanded output directory path.
    pub fn output_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.output_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_tool_policy() {
        let settings = Settings::default();
        assert_eq!(settings.image.max_dimension, 1920);
        assert_eq!(settings.image.quality, 85);
        assert_eq!(settings.video.crf, 23);
        assert_eq!(settings.video.preset, "medium");
        assert_eq!(settings.ocr.language, "eng");
        assert!(settings.agent.max_iterations > 0);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [agent]
            max_iterations = 3

            [server]
            port = 9000
            "#,
        )
        .unwrap();

        assert_eq!(settings.agent.max_iterations, 3);
        assert_eq!(settings.agent.model, "gpt-4-turbo-preview");
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.media.video_extensions.len(), 3);
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let settings = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(settings.general.output_dir, "output");
    }
}
