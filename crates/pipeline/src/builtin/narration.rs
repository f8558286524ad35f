//! ffmpeg-backed narration synthesizers.
//!
//! Neither produces speech. `tone` renders a sine tone whose length follows
//! the text, `silence` renders silent audio of the same length; together
//! they give every run a narration track without an external TTS vendor.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use slidecast_core::ffmpeg;

use crate::collaborators::{AudioAsset, JobContext, NarrationSynthesizer};
use crate::error::StageError;
use crate::fallback::Provider;

/// Characters of narration per second of audio.
const CHARS_PER_SECOND: f64 = 16.0;
const MIN_SEGMENT_SECS: f64 = 1.2;
const MAX_SEGMENT_SECS: f64 = 8.0;

const TONE_FREQUENCY_HZ: u32 = 800;
const SAMPLE_RATE: u32 = 22_050;

/// Audio length for a narration text, clamped to a sane window.
pub fn estimated_duration(text: &str) -> f64 {
    (text.chars().count() as f64 / CHARS_PER_SECOND).clamp(MIN_SEGMENT_SECS, MAX_SEGMENT_SECS)
}

async fn segment_path(ctx: &JobContext, provider: &str, index: usize) -> Result<PathBuf, StageError> {
    let dir = ctx.audio_dir();
    ctx.ensure_dir(&dir).await?;
    Ok(dir.join(format!("segment_{index:02}_{provider}.wav")))
}

/// Measured duration when ffprobe can read the file, else the requested one.
async fn measured_duration(path: &Path, requested: f64) -> f64 {
    match ffmpeg::probe_duration(path).await {
        Ok(d) if d > 0.0 => d,
        Ok(_) => requested,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "ffprobe failed, using requested duration");
            requested
        }
    }
}

// ---------------------------------------------------------------------------
// Tone
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ToneSynthesizer;

impl Provider for ToneSynthesizer {
    fn name(&self) -> &str {
        "tone"
    }
}

#[async_trait]
impl NarrationSynthesizer for ToneSynthesizer {
    async fn synthesize(
        &self,
        ctx: &JobContext,
        index: usize,
        text: &str,
    ) -> Result<AudioAsset, StageError> {
        if text.trim().is_empty() {
            return Err(StageError::provider(self.name(), "nothing to narrate"));
        }
        let duration = estimated_duration(text);
        let path = segment_path(ctx, self.name(), index).await?;

        let source = format!("sine=frequency={TONE_FREQUENCY_HZ}:duration={duration:.3}");
        let rate = SAMPLE_RATE.to_string();
        ffmpeg::run_ffmpeg([
            OsStr::new("-f"),
            OsStr::new("lavfi"),
            OsStr::new("-i"),
            OsStr::new(&source),
            OsStr::new("-ar"),
            OsStr::new(&rate),
            OsStr::new("-ac"),
            OsStr::new("1"),
            path.as_os_str(),
        ])
        .await?;

        Ok(AudioAsset {
            duration_secs: measured_duration(&path, duration).await,
            path,
        })
    }
}

// ---------------------------------------------------------------------------
// Silence
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct SilenceSynthesizer;

impl Provider for SilenceSynthesizer {
    fn name(&self) -> &str {
        "silence"
    }
}

#[async_trait]
impl NarrationSynthesizer for SilenceSynthesizer {
    async fn synthesize(
        &self,
        ctx: &JobContext,
        index: usize,
        text: &str,
    ) -> Result<AudioAsset, StageError> {
        let duration = estimated_duration(text);
        let path = segment_path(ctx, self.name(), index).await?;

        let source = format!("anullsrc=r={SAMPLE_RATE}:cl=mono");
        let length = format!("{duration:.3}");
        ffmpeg::run_ffmpeg([
            OsStr::new("-f"),
            OsStr::new("lavfi"),
            OsStr::new("-i"),
            OsStr::new(&source),
            OsStr::new("-t"),
            OsStr::new(&length),
            path.as_os_str(),
        ])
        .await?;

        Ok(AudioAsset {
            duration_secs: measured_duration(&path, duration).await,
            path,
        })
    }
}
