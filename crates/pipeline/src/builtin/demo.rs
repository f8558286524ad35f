//! Built-in sample paper.

use async_trait::async_trait;

use crate::collaborators::{Paper, PaperCriteria, PaperSource};
use crate::error::StageError;
use crate::fallback::Provider;

/// Identifier of the sample paper.
pub const DEMO_PAPER_ID: &str = "demo";

/// Serves the sample paper for demo runs, and as the last resort for
/// recent-paper runs when no other source produced one.
#[derive(Debug, Default)]
pub struct DemoPaperSource;

pub fn demo_paper() -> Paper {
    Paper {
        id: DEMO_PAPER_ID.to_string(),
        title: "Attention Is All You Need".to_string(),
        abstract_text: [
            "The dominant sequence transduction models are based on complex recurrent or convolutional neural networks.",
            "We propose the Transformer, a simple network architecture based solely on attention mechanisms.",
            "Experiments on two machine translation tasks show these models to be superior in quality while being more parallelizable.",
        ]
        .join("\n"),
        authors: vec![
            "Ashish Vaswani".to_string(),
            "Noam Shazeer".to_string(),
            "Niki Parmar".to_string(),
            "Jakob Uszkoreit".to_string(),
            "Llion Jones".to_string(),
            "Aidan N. Gomez".to_string(),
        ],
        url: Some("https://arxiv.org/abs/1706.03762".to_string()),
    }
}

impl Provider for DemoPaperSource {
    fn name(&self) -> &str {
        "demo"
    }
}

#[async_trait]
impl PaperSource for DemoPaperSource {
    async fn fetch(&self, criteria: &PaperCriteria) -> Result<Paper, StageError> {
        match criteria {
            PaperCriteria::Demo | PaperCriteria::Recent { .. } => Ok(demo_paper()),
            PaperCriteria::ById(id) if id == DEMO_PAPER_ID => Ok(demo_paper()),
            PaperCriteria::ById(id) => Err(StageError::Unsupported(format!(
                "demo source only serves '{DEMO_PAPER_ID}', not '{id}'"
            ))),
        }
    }
}
