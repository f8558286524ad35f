//! The fixed stage sequence and its progress arithmetic.

use std::fmt;

/// One ordered step of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    FetchPaper,
    Analyze,
    Script,
    PlanSlides,
    Assets,
    Render,
    Narration,
    Compose,
}

impl Stage {
    /// Every stage in execution order.
    pub const ALL: [Stage; 8] = [
        Stage::FetchPaper,
        Stage::Analyze,
        Stage::Script,
        Stage::PlanSlides,
        Stage::Assets,
        Stage::Render,
        Stage::Narration,
        Stage::Compose,
    ];

    /// Stages of a slides-only run.
    pub const SLIDES_ONLY: [Stage; 6] = [
        Stage::FetchPaper,
        Stage::Analyze,
        Stage::Script,
        Stage::PlanSlides,
        Stage::Assets,
        Stage::Render,
    ];

    /// Sequence for a run that does (or does not) end in a video.
    pub fn sequence(produces_video: bool) -> &'static [Stage] {
        if produces_video {
            &Self::ALL
        } else {
            &Self::SLIDES_ONLY
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FetchPaper => "fetch_paper",
            Self::Analyze => "analyze",
            Self::Script => "script",
            Self::PlanSlides => "plan_slides",
            Self::Assets => "assets",
            Self::Render => "render",
            Self::Narration => "narration",
            Self::Compose => "compose",
        }
    }

    /// Human-readable description used in stage log lines.
    pub fn describe(self) -> &'static str {
        match self {
            Self::FetchPaper => "Fetching paper",
            Self::Analyze => "Analyzing content",
            Self::Script => "Writing section scripts",
            Self::PlanSlides => "Planning slides",
            Self::Assets => "Generating slide assets",
            Self::Render => "Rendering slides",
            Self::Narration => "Synthesizing narration",
            Self::Compose => "Composing video",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Computes non-decreasing progress fractions across a stage sequence.
///
/// Overall progress is `(completed_stages + done / total_items) / stages`.
/// Values never go backwards even if a caller reports items out of order.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    stages: usize,
    completed: usize,
    last: f64,
}

impl ProgressTracker {
    pub fn new(stages: usize) -> Self {
        Self {
            stages: stages.max(1),
            completed: 0,
            last: 0.0,
        }
    }

    /// Progress at the start of the current stage.
    pub fn stage_start(&mut self) -> f64 {
        self.bump(self.completed as f64 / self.stages as f64)
    }

    /// Progress after `done` of `total` items of the current stage.
    pub fn item(&mut self, done: usize, total: usize) -> f64 {
        let within = if total == 0 {
            0.0
        } else {
            done.min(total) as f64 / total as f64
        };
        self.bump((self.completed as f64 + within) / self.stages as f64)
    }

    /// Mark the current stage complete and return the new progress.
    pub fn stage_done(&mut self) -> f64 {
        self.completed = (self.completed + 1).min(self.stages);
        self.bump(self.completed as f64 / self.stages as f64)
    }

    /// Last reported value.
    pub fn current(&self) -> f64 {
        self.last
    }

    fn bump(&mut self, value: f64) -> f64 {
        self.last = self.last.max(value.clamp(0.0, 1.0));
        self.last
    }
}
