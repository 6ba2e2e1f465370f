//! ffmpeg and ffprobe wrappers.
//!
//! Video re-encoding, audio extraction, and splitting long audio into
//! segments. All calls go through `tokio::process` so they never block the runtime,
//! and a child is killed when the future driving it is dropped.

use crate::config::VideoSettings;
use crate::error::{MediaError, Result};
use crate::media::PendingOutput;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Re-encodes a video with a fixed codec, preset and quality target.
#[instrument(skip_all, fields(source = %source.display()))]
pub async fn compress_video(source: &Path, dest: &Path, settings: &VideoSettings) -> Result<()> {
    let mut command = Command::new("ffmpeg");
    command
        .arg("-i").arg(source)
        .arg("-c:v").arg(&settings.codec)
        .arg("-preset").arg(&settings.preset)
        .arg("-crf").arg(settings.crf.to_string())
        .arg("-c:a").arg(&settings.audio_codec)
        .arg("-b:a").arg(&settings.audio_bitrate)
        .arg("-y")
        .arg("-loglevel").arg("error")
        .arg(dest);

    let pending = PendingOutput::new(dest);
    run_ffmpeg(command, "Video compression").await?;
    pending.keep();
    Ok(())
}

/// Extracts the audio track of a media file to MP3.
#[instrument(skip_all, fields(source = %source.display()))]
pub async fn extract_audio(source: &Path, dest: &Path) -> Result<()> {
    debug!("Extracting audio to {:?}", dest);

    let mut command = Command::new("ffmpeg");
    command
        .arg("-i").arg(source)
        .arg("-vn")
        .arg("-codec:a").arg("libmp3lame")
        .arg("-qscale:a").arg("2")
        .arg("-y")
        .arg("-loglevel").arg("error")
        .arg(dest);

    run_ffmpeg(command, "Audio extraction").await
}

/// Segments a long audio file into smaller chunks for processing.
///
/// Each chunk will be approximately `chunk_seconds` long. Returns the chunk
/// paths in playback order. Short audio is returned as-is.
#[instrument(skip_all)]
pub async fn split_audio(source: &Path, output_dir: &Path, chunk_seconds: u32) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;

    let total_duration = probe_duration(source).await?;
    info!("Total audio duration: {:.1}s", total_duration);

    let chunk_len = chunk_seconds.max(1) as f64;

    if total_duration <= chunk_len {
        return Ok(vec![source.to_path_buf()]);
    }

    let base_name = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("audio");

    let mut segments = Vec::new();
    let mut offset = 0.0;
    let mut idx = 0u32;

    while offset < total_duration {
        let segment_path = output_dir.join(format!("{}_{:04}.mp3", base_name, idx));
        let segment_len = chunk_len.min(total_duration - offset);

        extract_segment(source, &segment_path, offset, segment_len).await?;

        debug!("Created segment {} at offset {:.1}s", idx, offset);
        segments.push(segment_path);

        offset += chunk_len;
        idx += 1;
    }

    info!("Created {} audio segments", segments.len());
    Ok(segments)
}

/// Extracts a time segment from an audio file, re-encoding to MP3.
async fn extract_segment(source: &Path, dest: &Path, start: f64, length: f64) -> Result<()> {
    let mut command = Command::new("ffmpeg");
    command
        .arg("-ss").arg(format!("{:.3}", start))
        .arg("-i").arg(source)
        .arg("-t").arg(format!("{:.3}", length))
        .arg("-codec:a").arg("libmp3lame")
        .arg("-qscale:a").arg("2")
        .arg("-y")
        .arg("-loglevel").arg("error")
        .arg(dest);

    run_ffmpeg(command, "Segment extraction").await
}

/// Queries the duration of a media file using ffprobe with JSON output.
async fn probe_duration(path: &Path) -> Result<f64> {
    let result = Command::new("ffprobe")
        .arg("-v")
        .arg("error")
        .arg("-print_format")
        .arg("json")
        .arg("-show_format")
        .arg(path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(MediaError::ToolNotFound("ffprobe".into()));
        }
        Err(e) => return Err(MediaError::ToolFailed(format!("ffprobe failed: {e}"))),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MediaError::ToolFailed(format!("ffprobe failed: {}", stderr.trim())));
    }

    parse_duration(&String::from_utf8_lossy(&output.stdout))
}

/// Pull `format.duration` out of ffprobe's JSON output.
fn parse_duration(json_str: &str) -> Result<f64> {
    let parsed: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|_| MediaError::ToolFailed("Invalid ffprobe output".into()))?;

    parsed["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| MediaError::ToolFailed("Could not determine media duration".into()))
}

/// Run ffmpeg with the given arguments, surfacing its stderr on failure.
async fn run_ffmpeg(mut command: Command, what: &str) -> Result<()> {
    let result = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await;

    match result {
        Ok(out) if out.status.success() => Ok(()),
        Ok(out) => {
            let err = String::from_utf8_lossy(&out.stderr);
            Err(MediaError::ToolFailed(format!("{what} failed: {}", err.trim())))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(MediaError::ToolNotFound("ffmpeg".into()))
        }
        Err(e) => Err(MediaError::ToolFailed(format!("ffmpeg error: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        let json = r#"{"format": {"filename": "a.mp3", "duration": "125.480000"}}"#;
        assert!((parse_duration(json).unwrap() - 125.48).abs() < 1e-9);
    }

    #[test]
    fn test_parse_duration_missing_field() {
        assert!(parse_duration(r#"{"format": {}}"#).is_err());
        assert!(parse_duration("not json").is_err());
    }
}
