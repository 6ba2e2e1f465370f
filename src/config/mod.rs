//! Configuration module for smartmedia.
//!
//! Handles loading application settings and the built-in prompt templates.

mod prompts;
mod settings;

pub use prompts::{render, AGENT_SYSTEM_PROMPT, SUMMARIZE_PROMPT};
pub use settings::{
    AgentSettings, GeneralSettings, ImageSettings, MediaSettings, OcrSettings, ServerSettings,
    Settings, SummarizerSettings, TranscriptionSettings, VideoSettings, WorkerSettings,
};
