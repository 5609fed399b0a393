//! Collection pipeline
//!
//! query/horizon -> optimizer -> date bounds -> provider fan-out -> title
//! dedup -> date filter -> per-record classify + persist. Providers run
//! concurrently; persistence is sequential so two records in one batch
//! proposing the same new tag name cannot create two rows.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use super::classifier;
use crate::config::CollectionConfig;
use crate::db::{NewPaper, Store};
use crate::errors::AppError;
use crate::llm::{ChatMessage, ChatModel};
use crate::providers::{RawPaper, SourceAggregator};

/// Duplicate titles quoted back in the summary message are truncated here.
const DUPLICATE_TITLE_LEN: usize = 60;

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct CollectionRequest {
    pub query: Option<String>,
    pub horizon: Option<String>,
    /// Year, e.g. 2020; Jan 1 of that year becomes the lower bound.
    pub date_from: Option<i32>,
    /// Year; Dec 31 of that year becomes the upper bound.
    pub date_to: Option<i32>,
    #[serde(default)]
    pub use_optimizer: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionReport {
    pub success: bool,
    pub message: String,
    pub new_count: usize,
    pub duplicate_count: usize,
    pub total_found: usize,
}

/// Auto-collection result: the run report plus the query and horizon the
/// run actually used after defaulting, echoed back to the scheduler.
#[derive(Debug, Clone, Serialize)]
pub struct AutoCollectionReport {
    #[serde(flatten)]
    pub report: CollectionReport,
    pub query: String,
    pub horizon: String,
}

impl CollectionReport {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            new_count: 0,
            duplicate_count: 0,
            total_found: 0,
        }
    }
}

/// Resolve a horizon token into since/to bounds. Every bound is computed
/// from the single captured `now`, never by chained date mutation.
pub fn resolve_horizon(
    now: DateTime<Utc>,
    horizon: &str,
    date_from: Option<i32>,
    date_to: Option<i32>,
) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    match horizon {
        "today" => (Some(now - Duration::hours(24)), None),
        "week" => (Some(now - Duration::days(7)), None),
        "month" => (Some(now - Duration::days(30)), None),
        "year" => (Some(now - Duration::days(365)), None),
        "custom" => {
            let since = date_from.and_then(|y| Utc.with_ymd_and_hms(y, 1, 1, 0, 0, 0).single());
            let to = date_to.and_then(|y| Utc.with_ymd_and_hms(y, 12, 31, 23, 59, 59).single());
            (since, to)
        }
        other => {
            tracing::warn!(horizon = other, "Unknown horizon token, no bounds applied");
            (None, None)
        }
    }
}

/// Same-batch deduplication: first occurrence by lowercase title wins.
/// Cross-run suppression (stored urls) happens per-record at persist time.
pub fn dedupe_by_title(results: Vec<RawPaper>) -> Vec<RawPaper> {
    let mut seen = std::collections::HashSet::new();
    results
        .into_iter()
        .filter(|p| seen.insert(p.title.to_lowercase()))
        .collect()
}

/// Inclusive on both bounds; sentinel-dated records fall to any lower bound.
pub fn filter_by_range(
    results: Vec<RawPaper>,
    since: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Vec<RawPaper> {
    results
        .into_iter()
        .filter(|p| since.map_or(true, |s| p.published_at >= s))
        .filter(|p| to.map_or(true, |t| p.published_at <= t))
        .collect()
}

pub struct CollectionService {
    store: Arc<dyn Store>,
    aggregator: SourceAggregator,
    llm: Option<Arc<dyn ChatModel>>,
    config: CollectionConfig,
}

impl CollectionService {
    pub fn new(
        store: Arc<dyn Store>,
        aggregator: SourceAggregator,
        llm: Option<Arc<dyn ChatModel>>,
        config: CollectionConfig,
    ) -> Self {
        Self {
            store,
            aggregator,
            llm,
            config,
        }
    }

    /// Query optimizer. Short queries get the fixed domain qualifier, but
    /// only when it is absent already, so re-optimizing an optimized query
    /// never compounds it. Longer queries may be rewritten by the
    /// generative service; any failure returns the original unchanged.
    pub async fn optimize_query(&self, query: &str) -> String {
        let trimmed = query.trim();
        if trimmed.len() < self.config.short_query_len {
            if trimmed.contains(&self.config.query_qualifier) {
                return trimmed.to_string();
            }
            return format!("{trimmed} {}", self.config.query_qualifier);
        }

        let Some(llm) = &self.llm else {
            return trimmed.to_string();
        };

        let messages = vec![ChatMessage::user(format!(
            "Rewrite the following literature-search query to be more precise \
             for academic paper search. Return only the rewritten query, \
             nothing else.\n\nQuery: {trimmed}"
        ))];
        match llm.complete(&messages, 100).await {
            Ok(rewritten) => {
                let rewritten = rewritten.lines().next().unwrap_or_default().trim().to_string();
                if rewritten.is_empty() {
                    trimmed.to_string()
                } else {
                    tracing::debug!(original = trimmed, %rewritten, "Query optimized");
                    rewritten
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Query rewrite failed, keeping original");
                trimmed.to_string()
            }
        }
    }

    /// `runCollection`: caller-driven query and horizon. With no horizon at
    /// all, the lower bound is the most recent stored publication date, so
    /// each run only looks for newer material.
    pub async fn run_collection(&self, req: CollectionRequest) -> Result<CollectionReport, AppError> {
        let mut query = req
            .query
            .filter(|q| !q.trim().is_empty())
            .unwrap_or_else(|| self.config.default_query.clone());
        if req.use_optimizer {
            query = self.optimize_query(&query).await;
        }

        let now = Utc::now();
        let (since, to) = match req.horizon.as_deref() {
            Some(horizon) => resolve_horizon(now, horizon, req.date_from, req.date_to),
            None => (self.store.latest_publication_date().await?, None),
        };

        self.execute(&query, since, to).await
    }

    /// `runAutoCollection`: fixed defaults, optional overrides. Pipeline
    /// failures are folded into a `success: false` report so the scheduler
    /// always receives the resolved query/horizon echo.
    pub async fn run_auto_collection(
        &self,
        override_query: Option<String>,
        override_horizon: Option<String>,
    ) -> AutoCollectionReport {
        let query = override_query
            .filter(|q| !q.trim().is_empty())
            .unwrap_or_else(|| self.config.default_query.clone());
        let horizon = override_horizon
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| self.config.default_horizon.clone());

        tracing::info!(%query, %horizon, "Auto-collection starting");

        let (since, to) = resolve_horizon(Utc::now(), &horizon, None, None);
        let report = match self.execute(&query, since, to).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e, "Auto-collection failed");
                CollectionReport::failure("Auto-collection failed")
            }
        };

        AutoCollectionReport {
            report,
            query,
            horizon,
        }
    }

    async fn execute(
        &self,
        query: &str,
        since: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<CollectionReport, AppError> {
        let start = Instant::now();
        let enabled_sources = self.store.list_enabled_sources().await?;

        let raw = self.aggregator.collect(query, since, to, &enabled_sources).await;
        let unique = dedupe_by_title(raw);
        let candidates = filter_by_range(unique, since, to);
        let total_found = candidates.len();

        let mut new_count = 0;
        let mut duplicate_count = 0;
        let mut duplicate_titles: Vec<String> = Vec::new();

        for record in candidates {
            match self.persist(record).await? {
                Persisted::New => new_count += 1,
                Persisted::Duplicate(title) => {
                    duplicate_count += 1;
                    duplicate_titles.push(title);
                }
            }
        }

        metrics::counter!("paperharvest_collect_runs_total").increment(1);
        metrics::counter!("paperharvest_papers_new_total").increment(new_count as u64);
        metrics::counter!("paperharvest_papers_duplicate_total").increment(duplicate_count as u64);
        metrics::histogram!("paperharvest_collect_duration_seconds")
            .record(start.elapsed().as_secs_f64());

        tracing::info!(
            total_found,
            new_count,
            duplicate_count,
            elapsed_ms = start.elapsed().as_millis(),
            "Collection run complete"
        );

        Ok(CollectionReport {
            success: true,
            message: build_message(total_found, new_count, duplicate_count, &duplicate_titles),
            new_count,
            duplicate_count,
            total_found,
        })
    }

    /// Classify and persist one record. The url existence check runs
    /// immediately before insert; a uniqueness violation at insert time is
    /// a benign duplicate from a racing batch, not a failure.
    async fn persist(&self, record: RawPaper) -> Result<Persisted, AppError> {
        if self.store.find_paper_by_url(&record.url).await?.is_some() {
            return Ok(Persisted::Duplicate(truncate(&record.title)));
        }

        let tags = classifier::classify(&record.title, &record.abstract_text);
        let fields = NewPaper {
            title: record.title.clone(),
            abstract_text: record.abstract_text,
            url: record.url,
            source: record.source,
            published_at: record.published_at,
        };

        let paper = match self.store.create_paper(fields).await {
            Ok(paper) => paper,
            Err(e) if e.is_conflict() => {
                return Ok(Persisted::Duplicate(truncate(&record.title)));
            }
            Err(e) => return Err(e),
        };

        for tag in tags {
            let stored = self.store.find_or_create_tag(&tag.name, tag.kind).await?;
            self.store.link_paper_tag(paper.id, stored.id).await?;
        }

        Ok(Persisted::New)
    }
}

enum Persisted {
    New,
    Duplicate(String),
}

fn truncate(title: &str) -> String {
    if title.len() > DUPLICATE_TITLE_LEN {
        let cut = title
            .char_indices()
            .take_while(|(i, _)| *i < DUPLICATE_TITLE_LEN)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}...", &title[..cut])
    } else {
        title.to_string()
    }
}

fn build_message(
    total_found: usize,
    new_count: usize,
    duplicate_count: usize,
    duplicate_titles: &[String],
) -> String {
    let mut message = format!("Found {total_found} papers.\n");
    if new_count > 0 {
        message.push_str(&format!(
            "Added {new_count} new paper{}\n",
            if new_count > 1 { "s" } else { "" }
        ));
    }
    if duplicate_count > 0 {
        message.push_str(&format!(
            "Skipped {duplicate_count} duplicate{} (already in library)\n",
            if duplicate_count > 1 { "s" } else { "" }
        ));
        if duplicate_count <= 3 {
            message.push_str(&format!("   Examples: {}", duplicate_titles.join(", ")));
        }
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectionConfig;
    use crate::db::MemoryStore;
    use crate::providers::{sentinel_date, SearchProvider};
    use async_trait::async_trait;

    fn raw(title: &str, url: &str, published_at: DateTime<Utc>) -> RawPaper {
        RawPaper {
            title: title.to_string(),
            abstract_text: String::new(),
            url: url.to_string(),
            source: "ArXiv".to_string(),
            published_at,
        }
    }

    #[test]
    fn dedup_keeps_first_occurrence_by_lowercased_title() {
        let now = Utc::now();
        let results = vec![
            raw("Transformers in Finance", "http://a/1", now),
            raw("TRANSFORMERS IN FINANCE", "http://b/1", now),
            raw("Something Else", "http://a/2", now),
        ];
        let unique = dedupe_by_title(results);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].url, "http://a/1");
    }

    #[test]
    fn date_filter_is_inclusive_on_both_bounds() {
        let since = Utc::now() - Duration::days(7);
        let to = Utc::now();
        let results = vec![
            raw("on the bound", "http://a/1", since),
            raw("just before", "http://a/2", since - Duration::microseconds(1)),
            raw("upper bound", "http://a/3", to),
        ];
        let kept = filter_by_range(results, Some(since), Some(to));
        let titles: Vec<_> = kept.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["on the bound", "upper bound"]);
    }

    #[test]
    fn sentinel_dates_fall_to_any_lower_bound() {
        let since = Utc::now() - Duration::days(365 * 10);
        let results = vec![raw("dateless", "http://a/1", sentinel_date())];
        assert!(filter_by_range(results, Some(since), None).is_empty());
    }

    #[test]
    fn custom_horizon_resolves_year_boundaries() {
        let now = Utc::now();
        let (since, to) = resolve_horizon(now, "custom", Some(2020), Some(2021));
        assert_eq!(since.unwrap().to_rfc3339(), "2020-01-01T00:00:00+00:00");
        assert_eq!(to.unwrap().to_rfc3339(), "2021-12-31T23:59:59+00:00");
    }

    #[test]
    fn relative_horizons_compute_from_captured_now() {
        let now = Utc::now();
        let (since, _) = resolve_horizon(now, "week", None, None);
        assert_eq!(since.unwrap(), now - Duration::days(7));
        let (since, _) = resolve_horizon(now, "today", None, None);
        assert_eq!(since.unwrap(), now - Duration::hours(24));
    }

    struct StubProvider {
        name: &'static str,
        papers: Vec<RawPaper>,
    }

    #[async_trait]
    impl SearchProvider for StubProvider {
        fn name(&self) -> &'static str {
            self.name
        }
        fn matches_source(&self, s: &str) -> bool {
            s.to_lowercase().contains(self.name)
        }
        async fn fetch(&self, _q: &str, _l: usize) -> Result<Vec<RawPaper>, AppError> {
            Ok(self.papers.clone())
        }
    }

    fn test_config() -> CollectionConfig {
        CollectionConfig {
            default_query: "AI in banking".to_string(),
            default_horizon: "week".to_string(),
            provider_limit: 10,
            short_query_len: 5,
            query_qualifier: "banking AI".to_string(),
        }
    }

    fn service_with(store: Arc<MemoryStore>, papers: Vec<RawPaper>) -> CollectionService {
        let aggregator =
            SourceAggregator::new(vec![Arc::new(StubProvider { name: "stub", papers })], 10);
        CollectionService::new(store, aggregator, None, test_config())
    }

    #[tokio::test]
    async fn short_query_gets_qualifier_exactly_once() {
        let service = service_with(Arc::new(MemoryStore::new()), vec![]);
        let once = service.optimize_query("rl").await;
        assert_eq!(once, "rl banking AI");
        // Re-optimizing the output must not compound the qualifier. The
        // optimized query is longer than the short threshold, and with no
        // model configured it passes through unchanged.
        let twice = service.optimize_query(&once).await;
        assert_eq!(twice, once);
    }

    #[tokio::test]
    async fn long_query_without_model_is_unchanged() {
        let service = service_with(Arc::new(MemoryStore::new()), vec![]);
        let q = "graph neural networks for fraud";
        assert_eq!(service.optimize_query(q).await, q);
    }

    #[tokio::test]
    async fn end_to_end_scenario_counts_and_message() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::new());
        // T4's url is already stored from an earlier run
        store
            .create_paper(NewPaper {
                title: "T4".to_string(),
                abstract_text: String::new(),
                url: "http://papers/t4".to_string(),
                source: "ArXiv".to_string(),
                published_at: now - Duration::days(1),
            })
            .await
            .unwrap();

        let papers = vec![
            raw("T1", "http://papers/t1", now - Duration::days(1)),
            raw("t1", "http://papers/t1-mirror", now - Duration::days(1)),
            raw("T3", "http://papers/t3", now - Duration::days(2)),
            raw("T4", "http://papers/t4", now - Duration::days(1)),
        ];
        let service = service_with(store.clone(), papers);

        let report = service
            .run_collection(CollectionRequest {
                query: Some("transformer".to_string()),
                horizon: Some("week".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(report.success);
        assert_eq!(report.total_found, 3);
        assert_eq!(report.new_count, 2);
        assert_eq!(report.duplicate_count, 1);
        assert!(report.message.contains("Found 3 papers"));
        assert!(report.message.contains("Added 2 new"));
        assert!(report.message.contains("Skipped 1 duplicate"));
        assert_eq!(store.paper_count(), 3);
    }

    #[tokio::test]
    async fn only_enabled_sources_activate_providers() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::new());
        store.add_source("alpha index", "http://alpha", true);
        store.add_source("beta index", "http://beta", false);

        let aggregator = SourceAggregator::new(
            vec![
                Arc::new(StubProvider {
                    name: "alpha",
                    papers: vec![raw("From alpha", "http://papers/a", now - Duration::days(1))],
                }),
                Arc::new(StubProvider {
                    name: "beta",
                    papers: vec![raw("From beta", "http://papers/b", now - Duration::days(1))],
                }),
            ],
            10,
        );
        let service = CollectionService::new(store.clone(), aggregator, None, test_config());

        let report = service
            .run_collection(CollectionRequest {
                horizon: Some("week".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(report.new_count, 1);
        assert!(store.find_paper_by_url("http://papers/a").await.unwrap().is_some());
        assert!(store.find_paper_by_url("http://papers/b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rerun_with_identical_output_is_idempotent() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::new());
        let papers = vec![
            raw("Fraud detection with GNNs", "http://papers/1", now - Duration::days(1)),
            raw("RLHF for servicing bots", "http://papers/2", now - Duration::days(2)),
        ];
        let service = service_with(store.clone(), papers);
        let req = CollectionRequest {
            query: Some("fraud".to_string()),
            horizon: Some("week".to_string()),
            ..Default::default()
        };

        let first = service.run_collection(req.clone()).await.unwrap();
        assert_eq!(first.new_count, 2);
        assert_eq!(first.duplicate_count, 0);

        let second = service.run_collection(req).await.unwrap();
        assert_eq!(second.new_count, 0);
        assert_eq!(second.duplicate_count, second.total_found);
        assert_eq!(store.paper_count(), 2);
    }

    #[tokio::test]
    async fn classified_tags_are_linked_on_insert() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::new());
        let papers = vec![RawPaper {
            title: "Fraud detection system".to_string(),
            abstract_text: "reinforcement learning for AML compliance".to_string(),
            url: "http://papers/x".to_string(),
            source: "ArXiv".to_string(),
            published_at: now - Duration::days(1),
        }];
        let service = service_with(store.clone(), papers);

        let outcome = service.run_auto_collection(None, None).await;
        assert!(outcome.report.success);
        assert_eq!(outcome.query, "AI in banking");
        assert_eq!(outcome.horizon, "week");

        let paper = store.find_paper_by_url("http://papers/x").await.unwrap().unwrap();
        let tags = store.tags_for_paper(paper.id).await.unwrap();
        let names: Vec<_> = tags.iter().map(|t| t.name.as_str()).collect();
        assert!(names.contains(&"Fraud Detection"));
        assert!(names.contains(&"AML Compliance & Control"));
        assert!(names.contains(&"RLHF"));
    }
}
