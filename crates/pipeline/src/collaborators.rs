//! Interfaces of the external collaborators the runner drives.
//!
//! Each stage delegates to one of these traits. Implementations live in
//! [`crate::builtin`]; tests plug in their own.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use slidecast_core::event::PaperInfo;
use slidecast_core::types::JobId;
use tokio_util::sync::CancellationToken;

use crate::error::StageError;
use crate::fallback::Provider;

/// Authors carried on the `paper` event.
const MAX_EVENT_AUTHORS: usize = 5;

// ---------------------------------------------------------------------------
// Data passed between stages
// ---------------------------------------------------------------------------

/// A paper as returned by a paper source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub id: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub authors: Vec<String>,
    pub url: Option<String>,
}

impl Paper {
    /// Metadata published on the job's `paper` event.
    pub fn info(&self) -> PaperInfo {
        PaperInfo {
            id: self.id.clone(),
            title: self.title.clone(),
            url: self.url.clone(),
            authors: self.authors.iter().take(MAX_EVENT_AUTHORS).cloned().collect(),
        }
    }
}

/// What a paper source is asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaperCriteria {
    /// The built-in sample paper.
    Demo,
    ById(String),
    /// The newest paper out of a window of recent ones.
    Recent { max_papers: u32 },
}

/// Bar chart data attached to a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    pub title: String,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

/// One logical section of a paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub bullets: Vec<String>,
    pub chart: Option<Chart>,
}

/// Resources consumed by one collaborator call.
#[derive(Debug, Clone, PartialEq)]
pub struct Usage {
    pub agent: String,
    pub tokens: u64,
    pub cost: f64,
}

#[derive(Debug, Clone)]
pub struct Analysis {
    pub sections: Vec<Section>,
    pub usage: Option<Usage>,
}

/// On-slide bullets plus the spoken narration for one section.
#[derive(Debug, Clone)]
pub struct Script {
    pub bullets: Vec<String>,
    pub narration: String,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideLayout {
    TextBullets,
    /// Panel on the left, bullets on the right.
    LeftImageRightText,
}

/// Everything the renderer needs to draw one slide.
#[derive(Debug, Clone)]
pub struct SlideSpec {
    /// Position in the deck, starting at 1. Assigned by the runner.
    pub index: usize,
    pub title: String,
    pub bullets: Vec<String>,
    pub chart: Option<Chart>,
    pub layout: SlideLayout,
    pub narration: String,
}

/// A raster image on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAsset {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// A synthesized narration segment.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioAsset {
    pub path: PathBuf,
    pub duration_secs: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoAsset {
    pub path: PathBuf,
    pub subtitles: Option<PathBuf>,
    pub duration_secs: f64,
}

// ---------------------------------------------------------------------------
// JobContext
// ---------------------------------------------------------------------------

/// Per-job environment handed to collaborators that produce files.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: JobId,
    /// Root directory for this job's artifacts.
    pub work_dir: PathBuf,
    pub cancel: CancellationToken,
    /// Minimum on-screen time per slide, in seconds.
    pub min_slide_secs: f64,
}

impl JobContext {
    pub fn new(job_id: JobId, output_root: &Path, cancel: CancellationToken) -> Self {
        Self {
            job_id,
            work_dir: output_root.join(job_id.to_string()),
            cancel,
            min_slide_secs: crate::config::DEFAULT_MIN_SLIDE_SECS,
        }
    }

    pub fn slides_dir(&self) -> PathBuf {
        self.work_dir.join("slides")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.work_dir.join("assets")
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.work_dir.join("audio")
    }

    pub fn video_dir(&self) -> PathBuf {
        self.work_dir.join("video")
    }

    /// Create `dir` (and parents) if missing.
    pub async fn ensure_dir(&self, dir: &Path) -> Result<(), StageError> {
        tokio::fs::create_dir_all(dir).await?;
        Ok(())
    }

    /// Fail with [`StageError::Cancelled`] once cancellation was requested.
    pub fn checkpoint(&self) -> Result<(), StageError> {
        if self.cancel.is_cancelled() {
            Err(StageError::Cancelled)
        } else {
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PaperSource: Provider {
    /// Return [`StageError::Unsupported`] for criteria this source never
    /// handles and [`StageError::NotAvailable`] when it handles them but
    /// has no paper.
    async fn fetch(&self, criteria: &PaperCriteria) -> Result<Paper, StageError>;
}

#[async_trait]
pub trait ContentAnalyzer: Send + Sync {
    async fn analyze(&self, paper: &Paper) -> Result<Analysis, StageError>;
}

#[async_trait]
pub trait ScriptWriter: Send + Sync {
    async fn script(&self, paper: &Paper, section: &Section) -> Result<Script, StageError>;
}

#[async_trait]
pub trait SlidePlanner: Send + Sync {
    /// Slide specs for one section. Indexes are assigned by the runner.
    async fn plan(&self, section: &Section, script: &Script) -> Result<Vec<SlideSpec>, StageError>;
}

#[async_trait]
pub trait AssetGenerator: Send + Sync {
    /// An optional side panel for a slide.
    async fn generate(
        &self,
        ctx: &JobContext,
        slide: &SlideSpec,
    ) -> Result<Option<ImageAsset>, StageError>;
}

#[async_trait]
pub trait SlideRenderer: Send + Sync {
    async fn render(
        &self,
        ctx: &JobContext,
        slide: &SlideSpec,
        panel: Option<&ImageAsset>,
    ) -> Result<ImageAsset, StageError>;
}

#[async_trait]
pub trait NarrationSynthesizer: Provider {
    /// Synthesize segment `index` (starting at 1) of the narration.
    async fn synthesize(
        &self,
        ctx: &JobContext,
        index: usize,
        text: &str,
    ) -> Result<AudioAsset, StageError>;
}

#[async_trait]
pub trait VideoComposer: Send + Sync {
    /// Combine slides and narration. `captions` holds one subtitle line per
    /// slide.
    async fn compose(
        &self,
        ctx: &JobContext,
        slides: &[ImageAsset],
        audio: &[AudioAsset],
        captions: &[String],
    ) -> Result<VideoAsset, StageError>;
}
