//! Storage layer
//!
//! `Store` is the persistence contract the pipeline and chat flows are
//! written against. Two implementations:
//! - `Repository`: SeaORM on Postgres
//! - `MemoryStore`: in-process, for development mode and tests

pub mod memory;
pub mod models;
pub mod repository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
pub use memory::MemoryStore;
pub use models::{Paper, Source, Tag, TagKind};
pub use repository::Repository;

/// Field set for a paper insert. `collected_at` is stamped by the store.
#[derive(Debug, Clone)]
pub struct NewPaper {
    pub title: String,
    pub abstract_text: String,
    pub url: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
}

/// Typed query criteria interpreted by the store through a fixed
/// translation. All entries combine with OR; an entirely empty criteria
/// matches nothing.
#[derive(Debug, Clone, Default)]
pub struct PaperQuery {
    pub title_contains: Vec<String>,
    pub abstract_contains: Vec<String>,
    pub tag_name_in: Vec<String>,
}

impl PaperQuery {
    pub fn is_empty(&self) -> bool {
        self.title_contains.is_empty()
            && self.abstract_contains.is_empty()
            && self.tag_name_in.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaperWithTags {
    #[serde(flatten)]
    pub paper: Paper,
    pub tags: Vec<Tag>,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn find_paper_by_url(&self, url: &str) -> Result<Option<Paper>, AppError>;

    /// Insert a paper. A uniqueness violation on `url` surfaces as
    /// `AppError::AlreadyExists`; callers racing on the same url treat that
    /// as a duplicate, not a failure.
    async fn create_paper(&self, fields: NewPaper) -> Result<Paper, AppError>;

    async fn get_paper(&self, id: Uuid) -> Result<Option<Paper>, AppError>;

    async fn set_ai_summary(&self, id: Uuid, summary: String) -> Result<(), AppError>;

    /// Concurrency-safe: implemented as insert-then-reread-on-conflict, so
    /// two racing callers proposing the same new name observe one row.
    async fn find_or_create_tag(&self, name: &str, kind: TagKind) -> Result<Tag, AppError>;

    /// No-op if the pair is already linked.
    async fn link_paper_tag(&self, paper_id: Uuid, tag_id: Uuid) -> Result<(), AppError>;

    async fn unlink_paper_tag(&self, paper_id: Uuid, tag_id: Uuid) -> Result<(), AppError>;

    async fn tags_for_paper(&self, paper_id: Uuid) -> Result<Vec<Tag>, AppError>;

    async fn list_enabled_sources(&self) -> Result<Vec<Source>, AppError>;

    async fn count_enabled_sources(&self) -> Result<u64, AppError>;

    /// Most recent publication date in storage, if any. Used as the default
    /// lower bound when no horizon is supplied.
    async fn latest_publication_date(&self) -> Result<Option<DateTime<Utc>>, AppError>;

    /// Case-insensitive substring search per `PaperQuery`, tags included,
    /// newest publication first, capped at `limit`.
    async fn find_papers(
        &self,
        query: &PaperQuery,
        limit: u64,
    ) -> Result<Vec<PaperWithTags>, AppError>;
}
