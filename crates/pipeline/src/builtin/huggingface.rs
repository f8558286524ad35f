//! Paper metadata from the Hugging Face papers API.
//!
//! - `GET {base}/api/papers/{id}` for a single arXiv id.
//! - `GET {base}/api/daily_papers?limit=N` for recent papers, newest first.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::collaborators::{Paper, PaperCriteria, PaperSource};
use crate::error::StageError;
use crate::fallback::Provider;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const USER_AGENT: &str = concat!("slidecast/", env!("CARGO_PKG_VERSION"));

pub struct HuggingFacePaperSource {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct HfPaper {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    authors: Vec<HfAuthor>,
}

#[derive(Debug, Deserialize)]
struct HfAuthor {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct HfDailyEntry {
    paper: HfPaper,
}

impl HuggingFacePaperSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self::with_client(client, base_url)
    }

    /// Reuse an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn paper_by_id(&self, id: &str) -> Result<Paper, StageError> {
        let response = self
            .client
            .get(format!("{}/api/papers/{id}", self.base_url))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StageError::NotAvailable(format!("paper {id} not found")));
        }
        let response = Self::ensure_success(response).await?;
        let paper: HfPaper = response.json().await?;
        Ok(self.convert(paper))
    }

    async fn newest_paper(&self, max_papers: u32) -> Result<Paper, StageError> {
        let response = self
            .client
            .get(format!("{}/api/daily_papers", self.base_url))
            .query(&[("limit", max_papers.max(1))])
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;
        let entries: Vec<HfDailyEntry> = response.json().await?;

        tracing::debug!(count = entries.len(), "Fetched recent papers");
        entries
            .into_iter()
            .next()
            .map(|entry| self.convert(entry.paper))
            .ok_or_else(|| StageError::NotAvailable("no recent papers".to_string()))
    }

    fn convert(&self, paper: HfPaper) -> Paper {
        let title = if paper.title.trim().is_empty() {
            paper.id.clone()
        } else {
            collapse_whitespace(&paper.title)
        };
        Paper {
            url: Some(format!("{}/papers/{}", self.base_url, paper.id)),
            title,
            abstract_text: paper.summary.trim().to_string(),
            authors: paper
                .authors
                .into_iter()
                .map(|a| a.name)
                .filter(|name| !name.is_empty())
                .collect(),
            id: paper.id,
        }
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, StageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StageError::provider(
            "huggingface",
            format!("HTTP {}: {}", status.as_u16(), truncate(&body, 200)),
        ))
    }
}

impl Provider for HuggingFacePaperSource {
    fn name(&self) -> &str {
        "huggingface"
    }
}

#[async_trait]
impl PaperSource for HuggingFacePaperSource {
    async fn fetch(&self, criteria: &PaperCriteria) -> Result<Paper, StageError> {
        match criteria {
            PaperCriteria::Demo => Err(StageError::Unsupported(
                "demo runs use the built-in paper".to_string(),
            )),
            PaperCriteria::ById(id) => self.paper_by_id(id).await,
            PaperCriteria::Recent { max_papers } => self.newest_paper(*max_papers).await,
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn converts_api_paper() {
        let source = HuggingFacePaperSource::new("https://huggingface.co/");
        let raw: HfPaper = serde_json::from_value(serde_json::json!({
            "id": "2510.03215",
            "title": "Cache-to-Cache:\n  Direct Semantic Communication",
            "summary": "  We study...  ",
            "authors": [{"name": "A. Author"}, {"name": ""}, {"_id": "x"}],
            "upvotes": 12
        }))
        .unwrap();

        let paper = source.convert(raw);
        assert_eq!(paper.id, "2510.03215");
        assert_eq!(paper.title, "Cache-to-Cache: Direct Semantic Communication");
        assert_eq!(paper.abstract_text, "We study...");
        assert_eq!(paper.authors, vec!["A. Author"]);
        assert_eq!(
            paper.url.as_deref(),
            Some("https://huggingface.co/papers/2510.03215")
        );
    }

    #[test]
    fn daily_entries_parse() {
        let entries: Vec<HfDailyEntry> = serde_json::from_str(
            r#"[{"paper":{"id":"1","title":"One"},"numComments":0},{"paper":{"id":"2"}}]"#,
        )
        .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].paper.title, "");
    }

    #[tokio::test]
    async fn demo_criteria_is_unsupported() {
        let source = HuggingFacePaperSource::new("http://127.0.0.1:9");
        assert_matches!(
            source.fetch(&PaperCriteria::Demo).await,
            Err(StageError::Unsupported(_))
        );
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }
}
