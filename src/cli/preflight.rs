//! Pre-flight checks before starting work.
//!
//! The API key is required up front; missing media programs only disable
//! the tools that need them, so they are reported as warnings.

use crate::config::Settings;
use crate::error::{MediaError, Result};
use crate::openai::is_api_key_configured;
use std::process::Command;

/// Operations that talk to the model.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Long-running HTTP server.
    Serve,
    /// One-shot local processing.
    Process,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation) -> Result<()> {
    match operation {
        Operation::Serve | Operation::Process => check_api_key(),
    }
}

/// External programs the tools rely on that are not usable right now.
pub fn missing_programs(settings: &Settings) -> Vec<String> {
    ["ffmpeg", "ffprobe", settings.ocr.command.as_str()]
        .into_iter()
        .filter(|name| check_program(name).is_err())
        .map(str::to_string)
        .collect()
}

fn check_api_key() -> Result<()> {
    if is_api_key_configured() {
        Ok(())
    } else {
        Err(MediaError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        ))
    }
}

/// Check if an external program is available.
fn check_program(name: &str) -> Result<()> {
    // ffmpeg/ffprobe use -version (single dash), others use --version
    let version_arg = match name {
        "ffmpeg" | "ffprobe" => "-version",
        _ => "--version",
    };
    match Command::new(name).arg(version_arg).output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(MediaError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(MediaError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(MediaError::ToolNotFound(format!("{}: {}", name, e))),
    }
}
