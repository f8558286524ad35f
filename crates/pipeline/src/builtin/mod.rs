//! Collaborators shipped with slidecast, and the sets the server wires up.

pub mod assets;
pub mod compose;
pub mod demo;
pub mod dry_run;
pub mod huggingface;
pub mod narration;
pub mod outline;
pub mod render;

use std::sync::Arc;
use std::time::Duration;

use crate::collaborators::{NarrationSynthesizer, PaperSource};
use crate::config::PipelineConfig;
use crate::error::StageError;
use crate::fallback::ProviderChain;
use crate::runner::Collaborators;

/// Every narration provider known by name, in default priority order.
fn narration_registry(dry_run: Option<Duration>) -> ProviderChain<dyn NarrationSynthesizer> {
    let providers: Vec<Arc<dyn NarrationSynthesizer>> = match dry_run {
        Some(delay) => vec![
            Arc::new(dry_run::DryRunVoice::new("tone", delay)),
            Arc::new(dry_run::DryRunVoice::new("silence", delay)),
        ],
        None => vec![
            Arc::new(narration::ToneSynthesizer),
            Arc::new(narration::SilenceSynthesizer),
        ],
    };
    ProviderChain::new(providers)
}

/// Build the collaborator set described by `config`.
///
/// Fails when `config.narration_providers` names an unknown provider.
pub fn collaborators(config: &PipelineConfig) -> Result<Collaborators, StageError> {
    if config.dry_run {
        return dry_run_collaborators(config.dry_run_delay)
            .with_narration_order(&config.narration_providers);
    }

    let papers: Vec<Arc<dyn PaperSource>> = vec![
        Arc::new(huggingface::HuggingFacePaperSource::new(
            config.paper_source_url.clone(),
        )),
        Arc::new(demo::DemoPaperSource),
    ];

    Collaborators {
        papers: ProviderChain::new(papers),
        analyzer: Arc::new(outline::OutlineAnalyzer),
        scripts: Arc::new(outline::TemplateScriptWriter),
        planner: Arc::new(outline::BulletSlidePlanner),
        assets: Arc::new(assets::PanelAssetGenerator),
        renderer: Arc::new(render::PngSlideRenderer),
        narration: narration_registry(None),
        composer: Arc::new(compose::FfmpegVideoComposer),
    }
    .with_narration_order(&config.narration_providers)
}

/// Collaborators that perform no I/O, each call delayed by `delay`.
pub fn dry_run_collaborators(delay: Duration) -> Collaborators {
    Collaborators {
        papers: ProviderChain::new(vec![
            Arc::new(dry_run::DryRunPaperSource { delay }) as Arc<dyn PaperSource>
        ]),
        analyzer: Arc::new(outline::OutlineAnalyzer),
        scripts: Arc::new(outline::TemplateScriptWriter),
        planner: Arc::new(outline::BulletSlidePlanner),
        assets: Arc::new(dry_run::DryRunAssets { delay }),
        renderer: Arc::new(dry_run::DryRunRenderer { delay }),
        narration: narration_registry(Some(delay)),
        composer: Arc::new(dry_run::DryRunComposer { delay }),
    }
}
