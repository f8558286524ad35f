use std::path::PathBuf;
use std::time::Duration;

/// Minimum on-screen time per slide when none is configured.
pub const DEFAULT_MIN_SLIDE_SECS: f64 = 3.0;

pub const DEFAULT_PAPER_SOURCE_URL: &str = "https://huggingface.co";

/// Narration providers tried in this order unless configured otherwise.
pub const DEFAULT_NARRATION_PROVIDERS: [&str; 2] = ["tone", "silence"];

/// Settings for building collaborators and running jobs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root directory for per-job artifacts.
    pub output_dir: PathBuf,
    /// Base URL of the Hugging Face compatible paper API.
    pub paper_source_url: String,
    /// Ordered narration fallback chain.
    pub narration_providers: Vec<String>,
    pub min_slide_secs: f64,
    /// Use I/O-free collaborators.
    pub dry_run: bool,
    /// Artificial delay per dry-run collaborator call.
    pub dry_run_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            paper_source_url: DEFAULT_PAPER_SOURCE_URL.to_string(),
            narration_providers: DEFAULT_NARRATION_PROVIDERS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            min_slide_secs: DEFAULT_MIN_SLIDE_SECS,
            dry_run: false,
            dry_run_delay: Duration::ZERO,
        }
    }
}
