//! Deterministic content analysis, scripting and slide planning.
//!
//! These collaborators do no I/O. They turn a paper into the six-section
//! outline every run uses and write narration from the section bullets.

use async_trait::async_trait;

use crate::collaborators::{
    Analysis, Chart, ContentAnalyzer, Paper, Script, ScriptWriter, Section, SlideLayout,
    SlidePlanner, SlideSpec, Usage,
};
use crate::error::StageError;

/// Abstract lines carried onto the overview slide.
const OVERVIEW_BULLETS: usize = 3;

/// Rough characters-per-token ratio used for usage estimates.
const CHARS_PER_TOKEN: usize = 4;

fn estimate_usage(agent: &str, text: &str) -> Usage {
    Usage {
        agent: agent.to_string(),
        tokens: text.chars().count().div_ceil(CHARS_PER_TOKEN) as u64,
        cost: 0.0,
    }
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Splits a paper into Overview, Background, Method, Experiments, Results
/// and Conclusion sections.
#[derive(Debug, Default)]
pub struct OutlineAnalyzer;

impl OutlineAnalyzer {
    pub fn sections(paper: &Paper) -> Vec<Section> {
        let title = if paper.title.trim().is_empty() {
            paper.id.as_str()
        } else {
            paper.title.trim()
        };

        let mut overview: Vec<String> = paper
            .abstract_text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .take(OVERVIEW_BULLETS)
            .map(str::to_string)
            .collect();
        if overview.is_empty() {
            overview.push("No abstract available.".to_string());
        }

        let section = |name: &str, bullets: &[&str]| Section {
            title: format!("{title}: {name}"),
            bullets: bullets.iter().map(|b| b.to_string()).collect(),
            chart: None,
        };

        vec![
            Section {
                title: format!("{title}: Overview"),
                bullets: overview,
                chart: None,
            },
            section("Background", &["Context", "Problem", "Motivation"]),
            section("Method", &["Model", "Training", "Loss"]),
            section("Experiments", &["Datasets", "Baselines", "Metrics"]),
            Section {
                chart: Some(Chart {
                    title: "Accuracy".to_string(),
                    labels: vec!["A".into(), "B".into(), "C".into()],
                    values: vec![0.72, 0.81, 0.65],
                }),
                ..section("Results", &["Main Result", "Ablations", "Limitations"])
            },
            section("Conclusion", &["Summary", "Future Work", "Code"]),
        ]
    }
}

#[async_trait]
impl ContentAnalyzer for OutlineAnalyzer {
    async fn analyze(&self, paper: &Paper) -> Result<Analysis, StageError> {
        Ok(Analysis {
            sections: Self::sections(paper),
            usage: Some(estimate_usage(
                "analyzer",
                &format!("{}\n{}", paper.title, paper.abstract_text),
            )),
        })
    }
}

// ---------------------------------------------------------------------------
// Script writer
// ---------------------------------------------------------------------------

/// Narration assembled from the section title and its bullets.
#[derive(Debug, Default)]
pub struct TemplateScriptWriter;

impl TemplateScriptWriter {
    pub fn narration(section: &Section) -> String {
        let heading = section
            .title
            .rsplit_once(": ")
            .map_or(section.title.as_str(), |(_, name)| name);
        let mut sentences = vec![format!("{heading}.")];
        for bullet in &section.bullets {
            let bullet = bullet.trim().trim_end_matches('.');
            if !bullet.is_empty() {
                sentences.push(format!("{bullet}."));
            }
        }
        if let Some(chart) = &section.chart {
            sentences.push(format!("The chart compares {}.", chart.title.to_lowercase()));
        }
        sentences.join(" ")
    }
}

#[async_trait]
impl ScriptWriter for TemplateScriptWriter {
    async fn script(&self, _paper: &Paper, section: &Section) -> Result<Script, StageError> {
        let narration = Self::narration(section);
        Ok(Script {
            bullets: section.bullets.clone(),
            usage: Some(estimate_usage("script_writer", &narration)),
            narration,
        })
    }
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// One slide per section; sections with a chart get a side panel.
#[derive(Debug, Default)]
pub struct BulletSlidePlanner;

#[async_trait]
impl SlidePlanner for BulletSlidePlanner {
    async fn plan(&self, section: &Section, script: &Script) -> Result<Vec<SlideSpec>, StageError> {
        let layout = if section.chart.is_some() {
            SlideLayout::LeftImageRightText
        } else {
            SlideLayout::TextBullets
        };
        Ok(vec![SlideSpec {
            index: 0,
            title: section.title.clone(),
            bullets: script.bullets.clone(),
            chart: section.chart.clone(),
            layout,
            narration: script.narration.clone(),
        }])
    }
}
