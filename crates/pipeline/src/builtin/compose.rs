//! Slideshow video composition with ffmpeg.
//!
//! Each slide stays on screen for its narration segment, floored at the
//! job's minimum slide time. Slides and narration are fed through two
//! concat demuxer lists and muxed in a single ffmpeg call; the audio track
//! uses the same per-slide durations, with gaps filled by resampling.

use std::ffi::OsStr;
use std::path::Path;

use async_trait::async_trait;
use slidecast_core::ffmpeg::{self, ConcatEntry};
use slidecast_core::subtitles;

use crate::collaborators::{AudioAsset, ImageAsset, JobContext, VideoAsset, VideoComposer};
use crate::error::StageError;

const OUTPUT_FILTER: &str = "scale=1920:1080:force_original_aspect_ratio=decrease,pad=1920:1080:(ow-iw)/2:(oh-ih)/2,format=yuv420p";

#[derive(Debug, Default)]
pub struct FfmpegVideoComposer;

/// On-screen time of each slide: its narration length, at least `min_secs`.
///
/// Slides without a narration segment get `min_secs`.
pub fn slide_durations(slide_count: usize, audio: &[AudioAsset], min_secs: f64) -> Vec<f64> {
    (0..slide_count)
        .map(|i| {
            audio
                .get(i)
                .map_or(min_secs, |segment| segment.duration_secs.max(min_secs))
        })
        .collect()
}

async fn write_list(path: &Path, entries: &[ConcatEntry]) -> Result<(), StageError> {
    tokio::fs::write(path, ffmpeg::concat_list(entries)).await?;
    Ok(())
}

#[async_trait]
impl VideoComposer for FfmpegVideoComposer {
    async fn compose(
        &self,
        ctx: &JobContext,
        slides: &[ImageAsset],
        audio: &[AudioAsset],
        captions: &[String],
    ) -> Result<VideoAsset, StageError> {
        if slides.is_empty() {
            return Err(StageError::InvalidOutput("no slides to compose".to_string()));
        }

        let dir = ctx.video_dir();
        ctx.ensure_dir(&dir).await?;
        let durations = slide_durations(slides.len(), audio, ctx.min_slide_secs);

        let slide_list = dir.join("slides.txt");
        let slide_entries: Vec<ConcatEntry> = slides
            .iter()
            .zip(&durations)
            .map(|(slide, d)| ConcatEntry {
                path: absolute(&slide.path),
                duration_secs: Some(*d),
            })
            .collect();
        write_list(&slide_list, &slide_entries).await?;

        let video_path = dir.join("slidecast.mp4");
        let audio_list = dir.join("audio.txt");
        let mut args: Vec<&OsStr> = vec![
            OsStr::new("-f"),
            OsStr::new("concat"),
            OsStr::new("-safe"),
            OsStr::new("0"),
            OsStr::new("-i"),
            slide_list.as_os_str(),
        ];

        if !audio.is_empty() {
            let audio_entries: Vec<ConcatEntry> = audio
                .iter()
                .zip(&durations)
                .map(|(segment, d)| ConcatEntry {
                    path: absolute(&segment.path),
                    duration_secs: Some(*d),
                })
                .collect();
            write_list(&audio_list, &audio_entries).await?;
            args.extend([
                OsStr::new("-f"),
                OsStr::new("concat"),
                OsStr::new("-safe"),
                OsStr::new("0"),
                OsStr::new("-i"),
                audio_list.as_os_str(),
                OsStr::new("-af"),
                OsStr::new("aresample=async=1:first_pts=0"),
                OsStr::new("-c:a"),
                OsStr::new("aac"),
            ]);
        }

        args.extend([
            OsStr::new("-vf"),
            OsStr::new(OUTPUT_FILTER),
            OsStr::new("-c:v"),
            OsStr::new("libx264"),
            OsStr::new("-pix_fmt"),
            OsStr::new("yuv420p"),
            OsStr::new("-movflags"),
            OsStr::new("+faststart"),
            video_path.as_os_str(),
        ]);

        tracing::debug!(job_id = %ctx.job_id, slides = slides.len(), segments = audio.len(), "Running ffmpeg compose");
        ffmpeg::run_ffmpeg(args).await?;

        let expected: f64 = durations.iter().sum();
        let duration_secs = match ffmpeg::probe_duration(&video_path).await {
            Ok(d) if d > 0.0 => d,
            _ => expected,
        };

        let subtitles_path = dir.join("slidecast.vtt");
        let cues = subtitles::sequential_cues(captions, &durations, ctx.min_slide_secs);
        subtitles::write_vtt(&subtitles_path, &cues).await?;

        Ok(VideoAsset {
            path: video_path,
            subtitles: Some(subtitles_path),
            duration_secs,
        })
    }
}

fn absolute(path: &Path) -> std::path::PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
