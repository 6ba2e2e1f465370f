//! Media file helpers: type detection, output naming, and ffmpeg plumbing.

pub mod ffmpeg;

use crate::config::MediaSettings;
use crate::error::{MediaError, Result};
use std::path::{Path, PathBuf};

/// Fallback MIME type when nothing better can be guessed.
pub const DEFAULT_MIME: &str = "application/octet-stream";

/// Coarse media category derived from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
    Video,
    Unknown,
}

impl MediaKind {
    /// Classify a path using the configured extension lists.
    pub fn from_path(path: &Path, media: &MediaSettings) -> Self {
        let Some(ext) = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_lowercase()))
        else {
            return MediaKind::Unknown;
        };

        let listed = |exts: &[String]| exts.iter().any(|e| e.eq_ignore_ascii_case(&ext));

        if listed(&media.image_extensions) {
            MediaKind::Image
        } else if listed(&media.audio_extensions) {
            MediaKind::Audio
        } else if listed(&media.video_extensions) {
            MediaKind::Video
        } else {
            MediaKind::Unknown
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Video => write!(f, "video"),
            MediaKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Best-effort MIME type from a file name.
pub fn guess_mime(file_name: &str) -> String {
    mime_guess::from_path(file_name)
        .first_raw()
        .unwrap_or(DEFAULT_MIME)
        .to_string()
}

/// Reduce an uploaded file name to its final path component.
///
/// Rejects names that are empty or consist only of `.`/`..`.
pub fn sanitize_file_name(name: &str) -> Result<String> {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if base.is_empty() || base == "." || base == ".." {
        return Err(MediaError::InvalidInput(format!(
            "Invalid file name: {:?}",
            name
        )));
    }

    Ok(base.to_string())
}

/// Shared sink for tool output artifacts.
#[derive(Debug, Clone)]
pub struct OutputDir {
    root: PathBuf,
    unique: bool,
}

impl OutputDir {
    pub fn new(root: impl Into<PathBuf>, unique: bool) -> Self {
        Self {
            root: root.into(),
            unique,
        }
    }

    /// Build the output path for a tool result derived from `input`.
    ///
    /// Names follow `<prefix>_<file name>`, or `<prefix>_<id>_<file name>` when
    /// unique names are enabled. `extension` replaces the input extension.
    /// The directory is created if absent.
    pub fn path_for(&self, prefix: &str, input: &Path, extension: Option<&str>) -> Result<PathBuf> {
        let file_name = match extension {
            Some(ext) => {
                let stem = input
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .ok_or_else(|| no_file_name(input))?;
                format!("{}.{}", stem, ext)
            }
            None => input
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| no_file_name(input))?
                .to_string(),
        };

        std::fs::create_dir_all(&self.root)?;

        let name = if self.unique {
            let id = uuid::Uuid::new_v4().simple().to_string();
            format!("{}_{}_{}", prefix, &id[..8], file_name)
        } else {
            format!("{}_{}", prefix, file_name)
        };

        Ok(self.root.join(name))
    }
}

/// An output file still being written.
///
/// Removed on drop unless [`PendingOutput::keep`] was called, so an error or a
/// cancelled future never leaves a half-written artifact behind.
#[derive(Debug)]
pub struct PendingOutput {
    path: PathBuf,
    keep: bool,
}

impl PendingOutput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            keep: false,
        }
    }

    /// The write finished; leave the file in place.
    pub fn keep(mut self) -> PathBuf {
        self.keep = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for PendingOutput {
    fn drop(&mut self) {
        if !self.keep {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

fn no_file_name(input: &Path) -> MediaError {
    MediaError::InvalidInput(format!("Input has no file name: {}", input.display()))
}

/// Resolve a tool input string to an existing file.
pub fn existing_file(input: &str) -> Result<PathBuf> {
    let path = PathBuf::from(input.trim());
    if !path.is_file() {
        return Err(MediaError::InvalidInput(format!(
            "File not found: {}",
            path.display()
        )));
    }
    Ok(path)
}
