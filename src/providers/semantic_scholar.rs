//! Semantic Scholar provider
//!
//! Queries the Graph API paper search endpoint. The same backend aggregates
//! IEEE and ACM venues, so sources named after those also activate it.

use async_trait::async_trait;
use serde::Deserialize;

use super::{parse_publication_date, sentinel_date, RawPaper, SearchProvider};
use crate::errors::AppError;

const API_URL: &str = "https://api.semanticscholar.org/graph/v1/paper/search";
const FIELDS: &str = "title,abstract,url,venue,publicationDate";

pub struct SemanticScholarProvider {
    client: reqwest::Client,
}

impl SemanticScholarProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<ApiPaper>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPaper {
    #[serde(default)]
    paper_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    venue: Option<String>,
    #[serde(default)]
    publication_date: Option<String>,
}

fn normalize(paper: ApiPaper) -> Option<RawPaper> {
    // No title means an unusable record
    let title = paper.title.filter(|t| !t.trim().is_empty())?;

    let url = paper
        .url
        .filter(|u| !u.is_empty())
        .or_else(|| {
            paper
                .paper_id
                .map(|id| format!("https://www.semanticscholar.org/paper/{id}"))
        })?;

    let source = paper
        .venue
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "Semantic Scholar".to_string());

    Some(RawPaper {
        title,
        abstract_text: paper.abstract_text.unwrap_or_default(),
        url,
        source,
        published_at: paper
            .publication_date
            .as_deref()
            .map(parse_publication_date)
            .unwrap_or_else(sentinel_date),
    })
}

pub fn parse_response(body: &str) -> Result<Vec<RawPaper>, AppError> {
    let parsed: SearchResponse =
        serde_json::from_str(body).map_err(|e| AppError::ProviderResponse {
            provider: "semantic_scholar",
            message: e.to_string(),
        })?;
    Ok(parsed.data.into_iter().filter_map(normalize).collect())
}

#[async_trait]
impl SearchProvider for SemanticScholarProvider {
    fn name(&self) -> &'static str {
        "semantic_scholar"
    }

    fn matches_source(&self, source_name: &str) -> bool {
        let lower = source_name.to_lowercase();
        lower.contains("scholar") || lower.contains("ieee") || lower.contains("acm")
    }

    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<RawPaper>, AppError> {
        let res = self
            .client
            .get(API_URL)
            .query(&[
                ("query", query.to_string()),
                ("limit", limit.to_string()),
                ("fields", FIELDS.to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::ProviderUnavailable {
                provider: "semantic_scholar",
                message: e.to_string(),
            })?;

        if !res.status().is_success() {
            return Err(AppError::ProviderResponse {
                provider: "semantic_scholar",
                message: format!("status {}", res.status()),
            });
        }

        let body = res.text().await.map_err(|e| AppError::ProviderResponse {
            provider: "semantic_scholar",
            message: e.to_string(),
        })?;

        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_optional_fields() {
        let body = r#"{
            "total": 3,
            "data": [
                {
                    "paperId": "abc123",
                    "title": "Deep Credit Risk Models",
                    "abstract": "A study of default prediction.",
                    "url": "https://example.org/p/1",
                    "venue": "NeurIPS",
                    "publicationDate": "2024-03-15"
                },
                {
                    "paperId": "def456",
                    "title": "KYC Automation",
                    "abstract": null,
                    "url": null,
                    "venue": "",
                    "publicationDate": null
                },
                {
                    "paperId": "ghi789",
                    "title": null
                }
            ]
        }"#;

        let papers = parse_response(body).unwrap();
        assert_eq!(papers.len(), 2);

        assert_eq!(papers[0].source, "NeurIPS");
        assert_eq!(papers[0].published_at.to_rfc3339(), "2024-03-15T00:00:00+00:00");

        assert_eq!(papers[1].abstract_text, "");
        assert_eq!(papers[1].url, "https://www.semanticscholar.org/paper/def456");
        assert_eq!(papers[1].source, "Semantic Scholar");
        assert_eq!(papers[1].published_at, sentinel_date());
    }

    #[test]
    fn missing_data_field_is_empty() {
        assert!(parse_response(r#"{"total": 0}"#).unwrap().is_empty());
    }

    #[test]
    fn shared_backend_source_matching() {
        let provider = SemanticScholarProvider::new(reqwest::Client::new());
        assert!(provider.matches_source("Google Scholar"));
        assert!(provider.matches_source("IEEE Xplore"));
        assert!(provider.matches_source("ACM Digital Library"));
        assert!(!provider.matches_source("ArXiv"));
    }
}
