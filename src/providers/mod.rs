//! External literature-search providers
//!
//! Each provider wraps one search backend, encodes the query into that
//! backend's protocol and normalizes the response shape into `RawPaper`.
//! Provider failures are contained here: `search` logs and returns an empty
//! list, never an error.

pub mod aggregator;
pub mod arxiv;
pub mod semantic_scholar;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

pub use aggregator::SourceAggregator;
pub use arxiv::ArxivProvider;
pub use semantic_scholar::SemanticScholarProvider;

/// Normalized result record from one provider.
#[derive(Debug, Clone)]
pub struct RawPaper {
    pub title: String,
    pub abstract_text: String,
    pub url: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
}

/// Sentinel for records with a missing or unparseable publication date.
/// Far in the past so an unfiltered record never masquerades as fresh;
/// any lower date bound drops it.
pub fn sentinel_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap()
}

/// Parse a provider-supplied date, RFC 3339 first, then bare `YYYY-MM-DD`.
/// Anything else maps to the sentinel.
pub fn parse_publication_date(raw: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Utc.from_utc_datetime(&dt);
        }
    }
    sentinel_date()
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Canonical provider name, used for matching and logging.
    fn name(&self) -> &'static str;

    /// Whether an enabled source with this name activates the provider
    /// (case-insensitive substring semantics).
    fn matches_source(&self, source_name: &str) -> bool;

    /// Fetch and normalize up to `limit` results. May fail.
    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<RawPaper>, crate::errors::AppError>;

    /// Failure-contained fetch: errors are logged and contribute zero
    /// records to the batch.
    async fn search(&self, query: &str, limit: usize) -> Vec<RawPaper> {
        match self.fetch(query, limit).await {
            Ok(results) => {
                tracing::debug!(provider = self.name(), count = results.len(), "Provider results");
                results
            }
            Err(e) => {
                tracing::warn!(provider = self.name(), error = %e, "Provider search failed");
                vec![]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparseable_dates_fall_to_sentinel() {
        assert_eq!(parse_publication_date("not a date"), sentinel_date());
        assert_eq!(parse_publication_date(""), sentinel_date());
    }

    #[test]
    fn rfc3339_and_plain_dates_parse() {
        let dt = parse_publication_date("2024-09-08T12:30:00Z");
        assert_eq!(dt.to_rfc3339(), "2024-09-08T12:30:00+00:00");

        let dt = parse_publication_date("2024-09-08");
        assert_eq!(dt.to_rfc3339(), "2024-09-08T00:00:00+00:00");
    }
}
