//! FFmpeg/FFprobe subprocess helpers.
//!
//! Shared by the narration synthesizers and the video composer. All
//! commands run through [`tokio::process::Command`] so the caller's task
//! suspends instead of blocking a runtime thread.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Error type for FFmpeg/FFprobe operations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("ffprobe/ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffprobe/ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse ffprobe output: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("media file not found: {0}")]
    MediaNotFound(String),
}

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

/// Top-level ffprobe JSON output (`-print_format json -show_format -show_streams`).
#[derive(Debug, Deserialize)]
pub struct FfprobeOutput {
    #[serde(default)]
    pub streams: Vec<FfprobeStream>,
    pub format: FfprobeFormat,
}

/// A single stream from ffprobe output.
#[derive(Debug, Deserialize)]
pub struct FfprobeStream {
    pub codec_type: Option<String>,
    pub duration: Option<String>,
}

/// Format-level metadata from ffprobe.
#[derive(Debug, Deserialize)]
pub struct FfprobeFormat {
    pub duration: Option<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run `ffmpeg` with the given arguments, capturing stderr on failure.
///
/// `-y` and `-hide_banner` are always prepended.
pub async fn run_ffmpeg<I, S>(args: I) -> Result<(), FfmpegError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = tokio::process::Command::new("ffmpeg")
        .args(["-y", "-hide_banner", "-loglevel", "error"])
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(())
}

/// Run `ffprobe` on a media file and return the parsed JSON output.
pub async fn probe(path: &Path) -> Result<FfprobeOutput, FfmpegError> {
    if !path.exists() {
        return Err(FfmpegError::MediaNotFound(
            path.to_string_lossy().to_string(),
        ));
    }

    let output = tokio::process::Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str::<FfprobeOutput>(&stdout)
        .map_err(|e| FfmpegError::ParseError(format!("{e}: {stdout}")))
}

/// Probe a media file and return its duration in seconds.
pub async fn probe_duration(path: &Path) -> Result<f64, FfmpegError> {
    let output = probe(path).await?;
    Ok(parse_duration(&output))
}

/// Parse the media duration in seconds from ffprobe output.
pub fn parse_duration(probe: &FfprobeOutput) -> f64 {
    // Format-level duration first, then the first stream that has one.
    probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .or_else(|| {
            probe
                .streams
                .iter()
                .filter_map(|s| s.duration.as_deref())
                .find_map(|d| d.parse::<f64>().ok())
        })
        .unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// Concat demuxer lists
// ---------------------------------------------------------------------------

/// One entry in an ffmpeg concat demuxer list.
#[derive(Debug, Clone)]
pub struct ConcatEntry {
    pub path: PathBuf,
    /// On-screen duration for still images; `None` for audio/video clips.
    pub duration_secs: Option<f64>,
}

/// Render a concat demuxer list (`-f concat -safe 0 -i list.txt`).
///
/// When any entry carries a duration the last file is repeated without
/// one, otherwise ffmpeg ignores the final image's duration.
pub fn concat_list(entries: &[ConcatEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&format!("file '{}'\n", escape_concat_path(&entry.path)));
        if let Some(d) = entry.duration_secs {
            out.push_str(&format!("duration {d:.3}\n"));
        }
    }
    if let Some(last) = entries.last() {
        if last.duration_secs.is_some() {
            out.push_str(&format!("file '{}'\n", escape_concat_path(&last.path)));
        }
    }
    out
}

/// Escape a path for a single-quoted concat list entry.
fn escape_concat_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', "'\\''")
}
