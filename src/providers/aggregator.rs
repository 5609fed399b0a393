//! Source aggregator
//!
//! Decides which providers to invoke for a collection run, fans out to them
//! concurrently and flattens the results in provider-invocation order. A
//! failing provider contributes zero records and never cancels its siblings.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;

use super::{RawPaper, SearchProvider};
use crate::db::Source;

pub struct SourceAggregator {
    providers: Vec<Arc<dyn SearchProvider>>,
    per_provider_limit: usize,
}

impl SourceAggregator {
    pub fn new(providers: Vec<Arc<dyn SearchProvider>>, per_provider_limit: usize) -> Self {
        Self {
            providers,
            per_provider_limit,
        }
    }

    /// Providers activated by the enabled-source list. An empty list means
    /// all known providers.
    fn select(&self, enabled_sources: &[Source]) -> Vec<&Arc<dyn SearchProvider>> {
        if enabled_sources.is_empty() {
            return self.providers.iter().collect();
        }
        self.providers
            .iter()
            .filter(|p| enabled_sources.iter().any(|s| p.matches_source(&s.name)))
            .collect()
    }

    /// Concurrent fan-out/fan-in over the selected providers. The date
    /// bounds are telemetry only; filtering happens downstream.
    pub async fn collect(
        &self,
        query: &str,
        since: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        enabled_sources: &[Source],
    ) -> Vec<RawPaper> {
        let selected = self.select(enabled_sources);
        tracing::info!(
            query,
            since = since.map(|d| d.to_rfc3339()),
            to = to.map(|d| d.to_rfc3339()),
            providers = ?selected.iter().map(|p| p.name()).collect::<Vec<_>>(),
            "Searching providers"
        );

        let calls = selected
            .iter()
            .map(|p| p.search(query, self.per_provider_limit));
        let results: Vec<RawPaper> = join_all(calls).await.into_iter().flatten().collect();

        tracing::info!(raw_results = results.len(), "Provider fan-in complete");
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use crate::providers::{sentinel_date, ArxivProvider, SemanticScholarProvider};
    use async_trait::async_trait;
    use uuid::Uuid;

    fn source(name: &str) -> Source {
        Source {
            id: Uuid::new_v4(),
            name: name.to_string(),
            url: String::new(),
            enabled: true,
        }
    }

    fn real_aggregator() -> SourceAggregator {
        let client = reqwest::Client::new();
        SourceAggregator::new(
            vec![
                Arc::new(ArxivProvider::new(client.clone())),
                Arc::new(SemanticScholarProvider::new(client)),
            ],
            10,
        )
    }

    #[test]
    fn empty_source_list_selects_all_providers() {
        let agg = real_aggregator();
        assert_eq!(agg.select(&[]).len(), 2);
    }

    #[test]
    fn google_scholar_activates_the_graph_backend() {
        let agg = real_aggregator();
        let selected = agg.select(&[source("Google Scholar")]);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name(), "semantic_scholar");
    }

    #[test]
    fn ieee_and_acm_share_the_scholar_backend() {
        let agg = real_aggregator();
        for name in ["IEEE Xplore", "ACM Digital Library"] {
            let selected = agg.select(&[source(name)]);
            assert_eq!(selected.len(), 1, "{name}");
            assert_eq!(selected[0].name(), "semantic_scholar");
        }
    }

    #[test]
    fn unknown_source_selects_nothing() {
        let agg = real_aggregator();
        assert!(agg.select(&[source("SSRN")]).is_empty());
    }

    struct FixedProvider {
        name: &'static str,
        titles: Vec<&'static str>,
    }

    #[async_trait]
    impl SearchProvider for FixedProvider {
        fn name(&self) -> &'static str {
            self.name
        }
        fn matches_source(&self, s: &str) -> bool {
            s.to_lowercase().contains(self.name)
        }
        async fn fetch(&self, _query: &str, _limit: usize) -> Result<Vec<RawPaper>, AppError> {
            Ok(self
                .titles
                .iter()
                .map(|t| RawPaper {
                    title: t.to_string(),
                    abstract_text: String::new(),
                    url: format!("http://{}/{}", self.name, t),
                    source: self.name.to_string(),
                    published_at: sentinel_date(),
                })
                .collect())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl SearchProvider for FailingProvider {
        fn name(&self) -> &'static str {
            "broken"
        }
        fn matches_source(&self, s: &str) -> bool {
            s.to_lowercase().contains("broken")
        }
        async fn fetch(&self, _query: &str, _limit: usize) -> Result<Vec<RawPaper>, AppError> {
            Err(AppError::ProviderUnavailable {
                provider: "broken",
                message: "connection refused".into(),
            })
        }
    }

    #[tokio::test]
    async fn failing_provider_does_not_abort_the_batch() {
        let agg = SourceAggregator::new(
            vec![
                Arc::new(FailingProvider),
                Arc::new(FixedProvider {
                    name: "alpha",
                    titles: vec!["T1", "T2"],
                }),
            ],
            10,
        );
        let results = agg.collect("q", None, None, &[]).await;
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn results_keep_provider_invocation_order() {
        let agg = SourceAggregator::new(
            vec![
                Arc::new(FixedProvider {
                    name: "alpha",
                    titles: vec!["A1"],
                }),
                Arc::new(FixedProvider {
                    name: "beta",
                    titles: vec!["B1", "B2"],
                }),
            ],
            10,
        );
        let results = agg.collect("q", None, None, &[]).await;
        let titles: Vec<_> = results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["A1", "B1", "B2"]);
    }
}
