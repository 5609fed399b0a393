//! In-process `Store` implementation.
//!
//! Used when `database.url` is "memory" (development without Postgres) and
//! throughout the test suite. Mirrors the relational semantics: unique paper
//! urls, unique tag names, at-most-one paper/tag link.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use uuid::Uuid;

use super::models::{Paper, Source, Tag, TagKind};
use super::{NewPaper, PaperQuery, PaperWithTags, Store};
use crate::errors::AppError;

#[derive(Default)]
struct Inner {
    papers: Vec<Paper>,
    tags: Vec<Tag>,
    links: Vec<(Uuid, Uuid)>,
    sources: Vec<Source>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a source row (the settings screens own these in production).
    pub fn add_source(&self, name: &str, url: &str, enabled: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.sources.push(Source {
            id: Uuid::new_v4(),
            name: name.to_string(),
            url: url.to_string(),
            enabled,
        });
    }

    pub fn paper_count(&self) -> usize {
        self.inner.lock().unwrap().papers.len()
    }

    pub fn tag_count(&self) -> usize {
        self.inner.lock().unwrap().tags.len()
    }

    fn tags_for(inner: &Inner, paper_id: Uuid) -> Vec<Tag> {
        inner
            .links
            .iter()
            .filter(|(p, _)| *p == paper_id)
            .filter_map(|(_, t)| inner.tags.iter().find(|tag| tag.id == *t).cloned())
            .collect()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_paper_by_url(&self, url: &str) -> Result<Option<Paper>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.papers.iter().find(|p| p.url == url).cloned())
    }

    async fn create_paper(&self, fields: NewPaper) -> Result<Paper, AppError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.papers.iter().any(|p| p.url == fields.url) {
            return Err(AppError::AlreadyExists(fields.url));
        }
        let paper = Paper {
            id: Uuid::new_v4(),
            title: fields.title,
            abstract_text: fields.abstract_text,
            url: fields.url,
            source: fields.source,
            published_at: fields.published_at.into(),
            collected_at: Utc::now().into(),
            ai_summary: None,
        };
        inner.papers.push(paper.clone());
        Ok(paper)
    }

    async fn get_paper(&self, id: Uuid) -> Result<Option<Paper>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.papers.iter().find(|p| p.id == id).cloned())
    }

    async fn set_ai_summary(&self, id: Uuid, summary: String) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(paper) = inner.papers.iter_mut().find(|p| p.id == id) {
            paper.ai_summary = Some(summary);
        }
        Ok(())
    }

    async fn find_or_create_tag(&self, name: &str, kind: TagKind) -> Result<Tag, AppError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(tag) = inner.tags.iter().find(|t| t.name == name) {
            return Ok(tag.clone());
        }
        let tag = Tag {
            id: Uuid::new_v4(),
            name: name.to_string(),
            kind,
        };
        inner.tags.push(tag.clone());
        Ok(tag)
    }

    async fn link_paper_tag(&self, paper_id: Uuid, tag_id: Uuid) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.links.contains(&(paper_id, tag_id)) {
            inner.links.push((paper_id, tag_id));
        }
        Ok(())
    }

    async fn unlink_paper_tag(&self, paper_id: Uuid, tag_id: Uuid) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        inner.links.retain(|&(p, t)| !(p == paper_id && t == tag_id));
        Ok(())
    }

    async fn tags_for_paper(&self, paper_id: Uuid) -> Result<Vec<Tag>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(Self::tags_for(&inner, paper_id))
    }

    async fn list_enabled_sources(&self) -> Result<Vec<Source>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.sources.iter().filter(|s| s.enabled).cloned().collect())
    }

    async fn count_enabled_sources(&self) -> Result<u64, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.sources.iter().filter(|s| s.enabled).count() as u64)
    }

    async fn latest_publication_date(&self) -> Result<Option<DateTime<Utc>>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .papers
            .iter()
            .map(|p| p.published_at.with_timezone(&Utc))
            .max())
    }

    async fn find_papers(
        &self,
        query: &PaperQuery,
        limit: u64,
    ) -> Result<Vec<PaperWithTags>, AppError> {
        if query.is_empty() {
            return Ok(vec![]);
        }
        let inner = self.inner.lock().unwrap();
        let matches = |paper: &Paper| {
            let title = paper.title.to_lowercase();
            let abstract_text = paper.abstract_text.to_lowercase();
            let by_title = query
                .title_contains
                .iter()
                .any(|k| title.contains(&k.to_lowercase()));
            let by_abstract = query
                .abstract_contains
                .iter()
                .any(|k| abstract_text.contains(&k.to_lowercase()));
            let by_tag = !query.tag_name_in.is_empty()
                && Self::tags_for(&inner, paper.id)
                    .iter()
                    .any(|t| query.tag_name_in.iter().any(|n| *n == t.name));
            by_title || by_abstract || by_tag
        };

        let mut found: Vec<&Paper> = inner.papers.iter().filter(|p| matches(p)).collect();
        found.sort_by(|a, b| b.published_at.cmp(&a.published_at));

        Ok(found
            .into_iter()
            .take(limit as usize)
            .map(|p| PaperWithTags {
                paper: p.clone(),
                tags: Self::tags_for(&inner, p.id),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn new_paper(title: &str, url: &str) -> NewPaper {
        NewPaper {
            title: title.to_string(),
            abstract_text: String::new(),
            url: url.to_string(),
            source: "ArXiv".to_string(),
            published_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_url_is_a_conflict() {
        let store = MemoryStore::new();
        store.create_paper(new_paper("A", "http://x/1")).await.unwrap();
        let err = store.create_paper(new_paper("B", "http://x/1")).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.paper_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_find_or_create_yields_one_tag() {
        let store = Arc::new(MemoryStore::new());
        let a = {
            let store = store.clone();
            tokio::spawn(async move { store.find_or_create_tag("Fraud Detection", TagKind::Industrial).await })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move { store.find_or_create_tag("Fraud Detection", TagKind::Industrial).await })
        };
        let ta = a.await.unwrap().unwrap();
        let tb = b.await.unwrap().unwrap();
        assert_eq!(ta.id, tb.id);
        assert_eq!(store.tag_count(), 1);
    }

    #[tokio::test]
    async fn linking_twice_keeps_one_link() {
        let store = MemoryStore::new();
        let paper = store.create_paper(new_paper("A", "http://x/1")).await.unwrap();
        let tag = store.find_or_create_tag("RLHF", TagKind::Academic).await.unwrap();
        store.link_paper_tag(paper.id, tag.id).await.unwrap();
        store.link_paper_tag(paper.id, tag.id).await.unwrap();
        assert_eq!(store.tags_for_paper(paper.id).await.unwrap().len(), 1);

        store.unlink_paper_tag(paper.id, tag.id).await.unwrap();
        assert!(store.tags_for_paper(paper.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn latest_publication_date_tracks_maximum() {
        let store = MemoryStore::new();
        assert!(store.latest_publication_date().await.unwrap().is_none());

        let older = Utc::now() - chrono::Duration::days(30);
        let newer = Utc::now() - chrono::Duration::days(2);
        let mut p = new_paper("Old", "http://x/old");
        p.published_at = older;
        store.create_paper(p).await.unwrap();
        let mut p = new_paper("New", "http://x/new");
        p.published_at = newer;
        store.create_paper(p).await.unwrap();

        let latest = store.latest_publication_date().await.unwrap().unwrap();
        assert_eq!(latest.timestamp(), newer.timestamp());
    }
}
