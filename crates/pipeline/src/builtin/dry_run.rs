//! I/O-free collaborators.
//!
//! They return plausible assets with paths under the job directory but
//! never touch the filesystem, the network or ffmpeg. An optional delay
//! per call makes runs observable over a live connection.

use std::time::Duration;

use async_trait::async_trait;

use super::demo::demo_paper;
use super::narration::estimated_duration;
use crate::collaborators::{
    AssetGenerator, AudioAsset, ImageAsset, JobContext, NarrationSynthesizer, Paper,
    PaperCriteria, PaperSource, SlideLayout, SlideRenderer, SlideSpec, VideoAsset, VideoComposer,
};
use crate::error::StageError;
use crate::fallback::Provider;

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Answers every criteria: the demo paper, or a stand-in for an id.
#[derive(Debug, Default)]
pub struct DryRunPaperSource {
    pub delay: Duration,
}

impl Provider for DryRunPaperSource {
    fn name(&self) -> &str {
        "dry_run"
    }
}

#[async_trait]
impl PaperSource for DryRunPaperSource {
    async fn fetch(&self, criteria: &PaperCriteria) -> Result<Paper, StageError> {
        pause(self.delay).await;
        Ok(match criteria {
            PaperCriteria::ById(id) if id != super::demo::DEMO_PAPER_ID => Paper {
                id: id.clone(),
                title: format!("Paper {id}"),
                abstract_text: format!("Stand-in abstract for {id}."),
                authors: vec![],
                url: None,
            },
            _ => demo_paper(),
        })
    }
}

/// Reports a panel for chart slides without drawing it.
#[derive(Debug, Default)]
pub struct DryRunAssets {
    pub delay: Duration,
}

#[async_trait]
impl AssetGenerator for DryRunAssets {
    async fn generate(
        &self,
        ctx: &JobContext,
        slide: &SlideSpec,
    ) -> Result<Option<ImageAsset>, StageError> {
        pause(self.delay).await;
        if slide.layout != SlideLayout::LeftImageRightText {
            return Ok(None);
        }
        Ok(Some(ImageAsset {
            path: ctx.assets_dir().join(format!("panel_{:02}.png", slide.index)),
            width: super::assets::PANEL_SIZE,
            height: super::assets::PANEL_SIZE,
        }))
    }
}

#[derive(Debug, Default)]
pub struct DryRunRenderer {
    pub delay: Duration,
}

#[async_trait]
impl SlideRenderer for DryRunRenderer {
    async fn render(
        &self,
        ctx: &JobContext,
        slide: &SlideSpec,
        _panel: Option<&ImageAsset>,
    ) -> Result<ImageAsset, StageError> {
        pause(self.delay).await;
        Ok(ImageAsset {
            path: ctx.slides_dir().join(format!("slide_{:02}.png", slide.index)),
            width: super::render::SLIDE_WIDTH,
            height: super::render::SLIDE_HEIGHT,
        })
    }
}

/// Narration stand-in registered under a real provider name, so per-job
/// provider selection behaves the same as with the ffmpeg synthesizers.
#[derive(Debug)]
pub struct DryRunVoice {
    name: String,
    delay: Duration,
}

impl DryRunVoice {
    pub fn new(name: impl Into<String>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            delay,
        }
    }
}

impl Provider for DryRunVoice {
    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl NarrationSynthesizer for DryRunVoice {
    async fn synthesize(
        &self,
        ctx: &JobContext,
        index: usize,
        text: &str,
    ) -> Result<AudioAsset, StageError> {
        pause(self.delay).await;
        Ok(AudioAsset {
            path: ctx
                .audio_dir()
                .join(format!("segment_{index:02}_{}.wav", self.name)),
            duration_secs: estimated_duration(text),
        })
    }
}

#[derive(Debug, Default)]
pub struct DryRunComposer {
    pub delay: Duration,
}

#[async_trait]
impl VideoComposer for DryRunComposer {
    async fn compose(
        &self,
        ctx: &JobContext,
        slides: &[ImageAsset],
        audio: &[AudioAsset],
        _captions: &[String],
    ) -> Result<VideoAsset, StageError> {
        pause(self.delay).await;
        if slides.is_empty() {
            return Err(StageError::InvalidOutput("no slides to compose".to_string()));
        }
        let durations = super::compose::slide_durations(slides.len(), audio, ctx.min_slide_secs);
        Ok(VideoAsset {
            path: ctx.video_dir().join("slidecast.mp4"),
            subtitles: Some(ctx.video_dir().join("slidecast.vtt")),
            duration_secs: durations.iter().sum(),
        })
    }
}
