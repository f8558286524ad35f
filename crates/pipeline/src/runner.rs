//! Drives one job through its stage sequence.
//!
//! The runner is the only publisher of a job's events. It reports each
//! stage start, per-item progress and provider fallbacks, and always ends
//! the job with exactly one terminal status:
//!
//! - `succeeded` with the output descriptor once every stage finished;
//! - `failed` with the cause when a stage failed with no fallback left,
//!   or a collaborator panicked;
//! - `cancelled` when the job's cancellation token fired.
//!
//! Collaborator calls never run under a bus lock. Each call races the
//! cancellation token and is shielded against panics.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::json;
use slidecast_core::event::{JobEvent, TokenUsage};
use slidecast_core::request::{JobRequest, PipelineMode};
use slidecast_core::status::JobStatus;
use slidecast_events::JobPublisher;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::collaborators::{
    AssetGenerator, AudioAsset, ContentAnalyzer, ImageAsset, JobContext, NarrationSynthesizer,
    Paper, PaperCriteria, PaperSource, Script, ScriptWriter, Section, SlidePlanner, SlideRenderer,
    SlideSpec, Usage, VideoAsset, VideoComposer,
};
use crate::config::PipelineConfig;
use crate::error::StageError;
use crate::fallback::ProviderChain;
use crate::stage::{ProgressTracker, Stage};

/// Longest paper title quoted in log lines.
const TITLE_LOG_CHARS: usize = 80;

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// The full set of external collaborators a run consults.
pub struct Collaborators {
    pub papers: ProviderChain<dyn PaperSource>,
    pub analyzer: Arc<dyn ContentAnalyzer>,
    pub scripts: Arc<dyn ScriptWriter>,
    pub planner: Arc<dyn SlidePlanner>,
    pub assets: Arc<dyn AssetGenerator>,
    pub renderer: Arc<dyn SlideRenderer>,
    pub narration: ProviderChain<dyn NarrationSynthesizer>,
    pub composer: Arc<dyn VideoComposer>,
}

impl Collaborators {
    /// Restrict and reorder the narration chain. An empty list keeps it.
    pub fn with_narration_order<S: AsRef<str>>(mut self, names: &[S]) -> Result<Self, StageError> {
        if !names.is_empty() {
            self.narration = self.narration.select(names)?;
        }
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// PipelineRunner
// ---------------------------------------------------------------------------

/// Runs jobs against a shared collaborator set.
#[derive(Clone)]
pub struct PipelineRunner {
    collaborators: Arc<Collaborators>,
    output_dir: PathBuf,
    min_slide_secs: f64,
}

impl PipelineRunner {
    pub fn new(collaborators: Arc<Collaborators>, config: &PipelineConfig) -> Self {
        Self {
            collaborators,
            output_dir: config.output_dir.clone(),
            min_slide_secs: config.min_slide_secs,
        }
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Check per-job options against the configured collaborators.
    pub fn validate(&self, request: &JobRequest) -> Result<(), StageError> {
        self.narration_for(request).map(|_| ())
    }

    fn narration_for(
        &self,
        request: &JobRequest,
    ) -> Result<ProviderChain<dyn NarrationSynthesizer>, StageError> {
        match &request.options.narration_providers {
            Some(names) => self.collaborators.narration.select(names),
            None => Ok(self.collaborators.narration.clone()),
        }
    }

    /// Drive the job to a terminal status and return it.
    pub async fn run(
        &self,
        publisher: JobPublisher,
        request: JobRequest,
        cancel: CancellationToken,
    ) -> JobStatus {
        let job_id = publisher.job_id();
        let mode = request.mode.name();
        let span = tracing::info_span!("pipeline", job_id = %job_id, mode);

        let mut ctx = JobContext::new(job_id, &self.output_dir, cancel);
        ctx.min_slide_secs = self.min_slide_secs;
        let stages = Stage::sequence(request.mode.produces_video());
        let mut job = JobRun::new(publisher, ctx, stages.len());

        async move {
            if job.ctx.cancel.is_cancelled() {
                return job.finish_cancelled();
            }

            let narration = match self.narration_for(&request) {
                Ok(chain) => chain,
                Err(e) => return job.finish_failed(format!("Invalid job options: {e}")),
            };

            tracing::info!("Pipeline started");
            job.publisher.publish(JobEvent::status(
                JobStatus::Running,
                0.0,
                Some(format!("Running {mode} pipeline")),
            ));
            job.log(format!("[pipeline] {mode} BEGIN"));

            match self.drive(&mut job, &request, &narration).await {
                Ok(result) => {
                    job.stage = None;
                    job.log(format!("[pipeline] {mode} END"));
                    tracing::info!("Pipeline succeeded");
                    job.publisher.publish(JobEvent::Status {
                        status: JobStatus::Succeeded,
                        progress: 1.0,
                        message: Some("Completed".to_string()),
                        result: Some(result),
                    });
                    JobStatus::Succeeded
                }
                Err(StageError::Cancelled) => job.finish_cancelled(),
                Err(e) => {
                    let cause = match job.stage {
                        Some(stage) => format!("{stage} failed: {e}"),
                        None => e.to_string(),
                    };
                    job.log(format!("[pipeline] {mode} ERROR: {cause}"));
                    job.finish_failed(cause)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        job: &mut JobRun,
        request: &JobRequest,
        narration: &ProviderChain<dyn NarrationSynthesizer>,
    ) -> Result<serde_json::Value, StageError> {
        let paper = self.fetch_paper(job, &request.mode).await?;
        let sections = self.analyze(job, &paper).await?;
        let scripts = self.write_scripts(job, &paper, &sections).await?;
        let slides = self.plan_slides(job, &sections, &scripts).await?;
        let panels = self.generate_assets(job, &slides).await?;
        let images = self.render(job, &slides, &panels).await?;

        let slide_paths: Vec<String> = images.iter().map(|i| path_string(&i.path)).collect();
        let paper_summary = json!({ "id": paper.id, "title": paper.title });

        if !request.mode.produces_video() {
            return Ok(json!({
                "paper": paper_summary,
                "slides": slide_paths,
                "audio": [],
                "video": null,
                "subtitles": null,
                "duration_secs": null,
                "narration_providers": [],
            }));
        }

        let (audio, providers) = self.narrate(job, &slides, narration).await?;
        let captions: Vec<String> = slides.iter().map(|s| s.title.clone()).collect();
        let video = self.compose(job, &images, &audio, &captions).await?;

        Ok(json!({
            "paper": paper_summary,
            "slides": slide_paths,
            "audio": audio.iter().map(|a| path_string(&a.path)).collect::<Vec<_>>(),
            "video": path_string(&video.path),
            "subtitles": video.subtitles.as_deref().map(path_string),
            "duration_secs": video.duration_secs,
            "narration_providers": providers,
        }))
    }

    // ---- stages ----

    async fn fetch_paper(&self, job: &mut JobRun, mode: &PipelineMode) -> Result<Paper, StageError> {
        let stage = Stage::FetchPaper;
        job.begin(stage)?;

        let criteria = match mode {
            PipelineMode::Demo => PaperCriteria::Demo,
            PipelineMode::Single { paper_id } | PipelineMode::Slides { paper_id } => {
                PaperCriteria::ById(paper_id.clone())
            }
            PipelineMode::Complete { max_papers } => PaperCriteria::Recent {
                max_papers: *max_papers,
            },
        };

        let JobRun { publisher, ctx, .. } = &mut *job;
        let produced = self
            .collaborators
            .papers
            .run(
                |source| guarded(&ctx.cancel, source.fetch(&criteria)),
                |provider, e| {
                    report_failure(publisher, stage, provider, format!("source {provider} failed: {e}"))
                },
            )
            .await?;
        if produced.position > 0 {
            job.provider_log(
                &produced.provider,
                format!("[{stage}] fell back to source {}", produced.provider),
            );
        }

        let paper = produced.value;
        job.publisher.publish(JobEvent::Paper(paper.info()));
        job.log(format!(
            "[{stage}] {} :: {}",
            paper.id,
            paper.title.chars().take(TITLE_LOG_CHARS).collect::<String>()
        ));
        job.end();
        Ok(paper)
    }

    async fn analyze(&self, job: &mut JobRun, paper: &Paper) -> Result<Vec<Section>, StageError> {
        job.begin(Stage::Analyze)?;
        let analysis = guarded(&job.ctx.cancel, self.collaborators.analyzer.analyze(paper)).await?;
        if analysis.sections.is_empty() {
            return Err(StageError::InvalidOutput(
                "analyzer returned no sections".to_string(),
            ));
        }
        job.record_usage(analysis.usage);
        job.log(format!("[analyze] {} sections", analysis.sections.len()));
        job.flush_tokens();
        job.end();
        Ok(analysis.sections)
    }

    async fn write_scripts(
        &self,
        job: &mut JobRun,
        paper: &Paper,
        sections: &[Section],
    ) -> Result<Vec<Script>, StageError> {
        job.begin(Stage::Script)?;
        let total = sections.len();
        let mut scripts = Vec::with_capacity(total);
        for (i, section) in sections.iter().enumerate() {
            job.ctx.checkpoint()?;
            job.log(format!("[script] section {}/{total}: {}", i + 1, section.title));
            let script =
                guarded(&job.ctx.cancel, self.collaborators.scripts.script(paper, section)).await?;
            job.record_usage(script.usage.clone());
            scripts.push(script);
            job.item(i + 1, total);
        }
        job.flush_tokens();
        job.end();
        Ok(scripts)
    }

    async fn plan_slides(
        &self,
        job: &mut JobRun,
        sections: &[Section],
        scripts: &[Script],
    ) -> Result<Vec<SlideSpec>, StageError> {
        job.begin(Stage::PlanSlides)?;
        let total = sections.len();
        let mut slides = Vec::new();
        for (i, (section, script)) in sections.iter().zip(scripts).enumerate() {
            job.ctx.checkpoint()?;
            let planned =
                guarded(&job.ctx.cancel, self.collaborators.planner.plan(section, script)).await?;
            slides.extend(planned);
            job.item(i + 1, total);
        }
        if slides.is_empty() {
            return Err(StageError::InvalidOutput("planner produced no slides".to_string()));
        }
        for (i, slide) in slides.iter_mut().enumerate() {
            slide.index = i + 1;
        }
        job.log(format!("[plan_slides] {} slides planned", slides.len()));
        job.end();
        Ok(slides)
    }

    /// Panel failures are recoverable: the slide is rendered without one.
    async fn generate_assets(
        &self,
        job: &mut JobRun,
        slides: &[SlideSpec],
    ) -> Result<Vec<Option<ImageAsset>>, StageError> {
        job.begin(Stage::Assets)?;
        let total = slides.len();
        let mut panels = Vec::with_capacity(total);
        for (i, slide) in slides.iter().enumerate() {
            job.ctx.checkpoint()?;
            let panel =
                match guarded(&job.ctx.cancel, self.collaborators.assets.generate(&job.ctx, slide))
                    .await
                {
                    Ok(panel) => panel,
                    Err(StageError::Cancelled) => return Err(StageError::Cancelled),
                    Err(e) => {
                        tracing::warn!(slide = slide.index, error = %e, "Asset generation failed, continuing without panel");
                        job.provider_log(
                            "assets",
                            format!(
                                "[assets] slide {}/{total}: panel failed ({e}); rendering without it",
                                i + 1
                            ),
                        );
                        None
                    }
                };
            if panel.is_some() {
                job.log(format!("[assets] slide {}/{total}: panel ready", i + 1));
            }
            panels.push(panel);
            job.item(i + 1, total);
        }
        job.end();
        Ok(panels)
    }

    async fn render(
        &self,
        job: &mut JobRun,
        slides: &[SlideSpec],
        panels: &[Option<ImageAsset>],
    ) -> Result<Vec<ImageAsset>, StageError> {
        job.begin(Stage::Render)?;
        let total = slides.len();
        let mut images = Vec::with_capacity(total);
        for (i, slide) in slides.iter().enumerate() {
            job.ctx.checkpoint()?;
            job.log(format!("[render] rendering {}/{total}", i + 1));
            let panel = panels.get(i).and_then(Option::as_ref);
            let image = guarded(
                &job.ctx.cancel,
                self.collaborators.renderer.render(&job.ctx, slide, panel),
            )
            .await?;
            images.push(image);
            job.item(i + 1, total);
        }
        job.end();
        Ok(images)
    }

    async fn narrate(
        &self,
        job: &mut JobRun,
        slides: &[SlideSpec],
        chain: &ProviderChain<dyn NarrationSynthesizer>,
    ) -> Result<(Vec<AudioAsset>, Vec<String>), StageError> {
        let stage = Stage::Narration;
        job.begin(stage)?;
        let total = slides.len();
        let mut audio = Vec::with_capacity(total);
        let mut providers = Vec::with_capacity(total);

        for (i, slide) in slides.iter().enumerate() {
            job.ctx.checkpoint()?;
            let segment = i + 1;
            let JobRun { publisher, ctx, .. } = &mut *job;
            let ctx: &JobContext = ctx;
            let produced = chain
                .run(
                    |voice| guarded(&ctx.cancel, voice.synthesize(ctx, segment, &slide.narration)),
                    |provider, e| {
                        report_failure(
                            publisher,
                            stage,
                            provider,
                            format!("segment {segment}/{total}: {provider} failed: {e}"),
                        )
                    },
                )
                .await?;

            let message = if produced.position > 0 {
                format!(
                    "[narration] segment {segment}/{total}: fell back to {}",
                    produced.provider
                )
            } else {
                format!(
                    "[narration] segment {segment}/{total} via {}",
                    produced.provider
                )
            };
            job.provider_log(&produced.provider, message);
            audio.push(produced.value);
            providers.push(produced.provider);
            job.item(segment, total);
        }
        job.end();
        Ok((audio, providers))
    }

    async fn compose(
        &self,
        job: &mut JobRun,
        images: &[ImageAsset],
        audio: &[AudioAsset],
        captions: &[String],
    ) -> Result<VideoAsset, StageError> {
        job.begin(Stage::Compose)?;
        let video = guarded(
            &job.ctx.cancel,
            self.collaborators
                .composer
                .compose(&job.ctx, images, audio, captions),
        )
        .await?;
        job.log(format!(
            "[compose] video ready ({:.1}s)",
            video.duration_secs
        ));
        job.end();
        Ok(video)
    }
}

// ---------------------------------------------------------------------------
// JobRun
// ---------------------------------------------------------------------------

/// Mutable state of one run: the publisher plus progress and token books.
struct JobRun {
    publisher: JobPublisher,
    ctx: JobContext,
    tracker: ProgressTracker,
    tokens: TokenUsage,
    tokens_dirty: bool,
    stage: Option<Stage>,
    /// Last progress value put on the bus.
    reported: f64,
}

impl JobRun {
    fn new(publisher: JobPublisher, ctx: JobContext, stages: usize) -> Self {
        Self {
            publisher,
            ctx,
            tracker: ProgressTracker::new(stages),
            tokens: TokenUsage::default(),
            tokens_dirty: false,
            stage: None,
            reported: 0.0,
        }
    }

    fn log(&mut self, message: impl Into<String>) {
        let event = match self.stage {
            Some(stage) => JobEvent::stage_log(stage.as_str(), message),
            None => JobEvent::log(message),
        };
        self.publisher.publish(event);
    }

    fn provider_log(&mut self, provider: &str, message: impl Into<String>) {
        let stage = self.stage.map_or("pipeline", Stage::as_str);
        self.publisher
            .publish(JobEvent::provider_log(stage, provider, message));
    }

    fn progress(&mut self, value: f64) {
        if value <= self.reported {
            return;
        }
        self.reported = value;
        let stage = self.stage.map(|s| s.as_str().to_string());
        self.publisher.publish(JobEvent::progress(value, stage));
    }

    fn begin(&mut self, stage: Stage) -> Result<(), StageError> {
        self.ctx.checkpoint()?;
        self.stage = Some(stage);
        tracing::debug!(stage = %stage, "Stage started");
        self.log(format!("[{stage}] {}", stage.describe()));
        let value = self.tracker.stage_start();
        self.progress(value);
        Ok(())
    }

    fn item(&mut self, done: usize, total: usize) {
        let value = self.tracker.item(done, total);
        self.progress(value);
    }

    fn end(&mut self) {
        let value = self.tracker.stage_done();
        self.progress(value);
    }

    fn record_usage(&mut self, usage: Option<Usage>) {
        if let Some(usage) = usage {
            self.tokens.record(&usage.agent, usage.tokens, usage.cost);
            self.tokens_dirty = true;
        }
    }

    fn flush_tokens(&mut self) {
        if self.tokens_dirty {
            self.tokens_dirty = false;
            self.publisher.publish(JobEvent::Token(self.tokens.clone()));
        }
    }

    fn finish_failed(&mut self, cause: String) -> JobStatus {
        tracing::error!(error = %cause, "Pipeline failed");
        self.publisher.publish(JobEvent::status(
            JobStatus::Failed,
            self.reported,
            Some(cause),
        ));
        JobStatus::Failed
    }

    fn finish_cancelled(&mut self) -> JobStatus {
        tracing::info!("Pipeline cancelled");
        self.publisher.publish(JobEvent::status(
            JobStatus::Cancelled,
            self.reported,
            Some("Cancelled".to_string()),
        ));
        JobStatus::Cancelled
    }
}

fn report_failure(publisher: &mut JobPublisher, stage: Stage, provider: &str, message: String) {
    tracing::warn!(stage = %stage, provider, %message, "Provider failed");
    publisher.publish(JobEvent::provider_log(
        stage.as_str(),
        provider,
        format!("[{stage}] {message}"),
    ));
}

/// Await a collaborator call, giving up on cancellation and turning a
/// panic into [`StageError::Panicked`].
async fn guarded<T, F>(cancel: &CancellationToken, call: F) -> Result<T, StageError>
where
    F: Future<Output = Result<T, StageError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StageError::Cancelled),
        outcome = AssertUnwindSafe(call).catch_unwind() => match outcome {
            Ok(result) => result,
            Err(panic) => Err(StageError::Panicked(panic_message(panic.as_ref()))),
        },
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn path_string(path: &std::path::Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn guarded_converts_panics() {
        let cancel = CancellationToken::new();
        let outcome: Result<(), StageError> =
            guarded(&cancel, async { panic!("collaborator exploded") }).await;
        assert!(matches!(outcome, Err(StageError::Panicked(msg)) if msg == "collaborator exploded"));
    }

    #[tokio::test]
    async fn guarded_stops_on_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome: Result<(), StageError> =
            guarded(&cancel, std::future::pending()).await;
        assert!(matches!(outcome, Err(StageError::Cancelled)));
    }
}
