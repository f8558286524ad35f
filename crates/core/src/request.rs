//! Job submission payloads.
//!
//! A request selects one of the pipeline modes and carries mode-specific
//! fields inline:
//!
//! ```json
//! {"mode": "single", "paper_id": "1706.03762", "options": {"narration_providers": ["silence"]}}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default fetch window for `complete` mode.
pub const DEFAULT_MAX_PAPERS: u32 = 1;

/// Upper bound for the `complete` mode fetch window.
pub const MAX_PAPERS_LIMIT: u32 = 20;

/// Maximum length of a paper identifier.
const MAX_PAPER_ID_LEN: usize = 64;

/// Which flavour of pipeline run to execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PipelineMode {
    /// Built-in sample paper, every stage.
    Demo,
    /// One paper by identifier, every stage.
    Single { paper_id: String },
    /// Newest paper from a recent-papers window, every stage.
    Complete {
        #[serde(default = "default_max_papers")]
        max_papers: u32,
    },
    /// One paper by identifier, stopping after slide rendering.
    Slides { paper_id: String },
}

fn default_max_papers() -> u32 {
    DEFAULT_MAX_PAPERS
}

impl PipelineMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Demo => "demo",
            Self::Single { .. } => "single",
            Self::Complete { .. } => "complete",
            Self::Slides { .. } => "slides",
        }
    }

    /// Whether the run ends with narration and video composition.
    pub fn produces_video(&self) -> bool {
        !matches!(self, Self::Slides { .. })
    }
}

/// Per-job tuning knobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    /// Restrict and reorder the narration fallback chain to these providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration_providers: Option<Vec<String>>,
}

/// A request to create a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    #[serde(flatten)]
    pub mode: PipelineMode,
    #[serde(default)]
    pub options: JobOptions,
}

impl JobRequest {
    pub fn new(mode: PipelineMode) -> Self {
        Self {
            mode,
            options: JobOptions::default(),
        }
    }

    /// Check field-level constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), CoreError> {
        match &self.mode {
            PipelineMode::Demo => {}
            PipelineMode::Single { paper_id } | PipelineMode::Slides { paper_id } => {
                validate_paper_id(paper_id)?;
            }
            PipelineMode::Complete { max_papers } => {
                if *max_papers == 0 || *max_papers > MAX_PAPERS_LIMIT {
                    return Err(CoreError::Validation(format!(
                        "max_papers must be between 1 and {MAX_PAPERS_LIMIT}"
                    )));
                }
            }
        }

        if let Some(providers) = &self.options.narration_providers {
            if providers.is_empty() {
                return Err(CoreError::Validation(
                    "narration_providers must not be empty when given".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Validate a paper identifier.
///
/// Rules:
/// - Must not be empty.
/// - Must not exceed `MAX_PAPER_ID_LEN` characters.
/// - Must contain only alphanumeric, dot, hyphen, or underscore characters.
pub fn validate_paper_id(paper_id: &str) -> Result<(), CoreError> {
    if paper_id.is_empty() {
        return Err(CoreError::Validation(
            "paper_id must not be empty".to_string(),
        ));
    }
    if paper_id.len() > MAX_PAPER_ID_LEN {
        return Err(CoreError::Validation(format!(
            "paper_id must not exceed {MAX_PAPER_ID_LEN} characters"
        )));
    }
    if !paper_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
    {
        return Err(CoreError::Validation(
            "paper_id may only contain alphanumeric, dot, hyphen, or underscore characters"
                .to_string(),
        ));
    }
    Ok(())
}
