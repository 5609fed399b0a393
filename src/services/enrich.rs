//! Per-paper enrichment of records already in storage: assisted tag
//! suggestions, lazy technical summaries, and manual tag mutations.

use std::sync::Arc;
use uuid::Uuid;

use super::classifier::{self, SuggestedTag, MAX_SUGGESTIONS};
use crate::db::{Paper, Store, Tag, TagKind};
use crate::errors::AppError;
use crate::llm::{ChatMessage, ChatModel};

pub struct EnrichService {
    store: Arc<dyn Store>,
    llm: Option<Arc<dyn ChatModel>>,
}

impl EnrichService {
    pub fn new(store: Arc<dyn Store>, llm: Option<Arc<dyn ChatModel>>) -> Self {
        Self { store, llm }
    }

    async fn require_paper(&self, id: Uuid) -> Result<Paper, AppError> {
        self.store
            .get_paper(id)
            .await?
            .ok_or_else(|| AppError::NotFound {
                resource_type: "paper".to_string(),
                resource_id: id.to_string(),
            })
    }

    /// Assisted suggestion mode. The generative service proposes 3-5 topic
    /// phrases; any failure (no model, call error, nothing parseable) falls
    /// back to the deterministic classifier. Names already linked to the
    /// paper are excluded case-insensitively.
    pub async fn suggest_tags(&self, paper_id: Uuid) -> Result<Vec<SuggestedTag>, AppError> {
        let paper = self.require_paper(paper_id).await?;

        let mut candidates: Vec<SuggestedTag> = Vec::new();
        if let Some(llm) = &self.llm {
            let prompt = classifier::tag_prompt(&paper.title, &paper.abstract_text);
            match llm.complete(&prompt, 200).await {
                Ok(text) => {
                    candidates = classifier::parse_tag_list(&text)
                        .into_iter()
                        .map(|name| SuggestedTag {
                            name,
                            kind: TagKind::Academic,
                        })
                        .collect();
                }
                Err(e) => {
                    tracing::warn!(paper_id = %paper_id, error = %e, "Assisted tagging failed");
                }
            }
        }
        if candidates.is_empty() {
            tracing::debug!(paper_id = %paper_id, "Using deterministic classifier for suggestions");
            candidates = classifier::classify(&paper.title, &paper.abstract_text);
        }

        let existing = self.store.tags_for_paper(paper_id).await?;
        let existing_names: Vec<String> =
            existing.iter().map(|t| t.name.to_lowercase()).collect();

        Ok(candidates
            .into_iter()
            .filter(|c| !existing_names.contains(&c.name.to_lowercase()))
            .take(MAX_SUGGESTIONS)
            .collect())
    }

    /// Generate and persist a short technical summary. Deterministic
    /// fallback text when no model is configured or the call fails.
    pub async fn generate_summary(&self, paper_id: Uuid) -> Result<String, AppError> {
        let paper = self.require_paper(paper_id).await?;

        let summary = match &self.llm {
            Some(llm) => {
                let abstract_text = if paper.abstract_text.is_empty() {
                    "No abstract available"
                } else {
                    &paper.abstract_text
                };
                let prompt = vec![ChatMessage::user(format!(
                    "You are a research analyst specializing in AI and Banking. Analyze the \
                     following paper and provide a concise (3-4 sentences), highly technical \
                     summary.\n\nFocus on:\n1. The core methodology or contribution\n2. Key \
                     technical findings\n3. Potential applications within the financial or \
                     banking sector.\n\nTitle: {}\nAbstract: {}\n\nSummary:",
                    paper.title, abstract_text
                ))];
                match llm.complete(&prompt, 500).await {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(paper_id = %paper_id, error = %e, "Summary generation failed");
                        fallback_summary(&paper.title)
                    }
                }
            }
            None => fallback_summary(&paper.title),
        };

        self.store.set_ai_summary(paper_id, summary.clone()).await?;
        Ok(summary)
    }

    /// Manual tag addition: the tag is created as UserDefined if the name
    /// is new, then linked (no-op when already linked).
    pub async fn add_user_tag(&self, paper_id: Uuid, tag_name: &str) -> Result<Tag, AppError> {
        self.require_paper(paper_id).await?;
        let tag = self
            .store
            .find_or_create_tag(tag_name, TagKind::UserDefined)
            .await?;
        self.store.link_paper_tag(paper_id, tag.id).await?;
        Ok(tag)
    }

    pub async fn remove_tag(&self, paper_id: Uuid, tag_id: Uuid) -> Result<(), AppError> {
        self.store.unlink_paper_tag(paper_id, tag_id).await
    }
}

fn fallback_summary(title: &str) -> String {
    format!(
        "Summary for \"{title}\": This paper explores technical advancements in its field and \
         their implications for modern systems, including potential banking applications. \
         (Fallback Summary)"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, NewPaper};
    use async_trait::async_trait;
    use chrono::Utc;

    async fn seed(store: &MemoryStore, title: &str, abstract_text: &str) -> Paper {
        store
            .create_paper(NewPaper {
                title: title.to_string(),
                abstract_text: abstract_text.to_string(),
                url: format!("http://p/{title}"),
                source: "ArXiv".to_string(),
                published_at: Utc::now(),
            })
            .await
            .unwrap()
    }

    struct JsonModel(&'static str);

    #[async_trait]
    impl ChatModel for JsonModel {
        async fn complete(&self, _m: &[ChatMessage], _t: u32) -> Result<String, AppError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingModel;

    #[async_trait]
    impl ChatModel for FailingModel {
        async fn complete(&self, _m: &[ChatMessage], _t: u32) -> Result<String, AppError> {
            Err(AppError::LlmError("boom".to_string()))
        }
    }

    #[tokio::test]
    async fn unknown_paper_is_not_found() {
        let service = EnrichService::new(Arc::new(MemoryStore::new()), None);
        let err = service.suggest_tags(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn suggestions_exclude_already_linked_names_case_insensitively() {
        let store = Arc::new(MemoryStore::new());
        let paper = seed(&store, "GNN study", "").await;
        let tag = store
            .find_or_create_tag("Graph Learning", TagKind::Academic)
            .await
            .unwrap();
        store.link_paper_tag(paper.id, tag.id).await.unwrap();

        let model = JsonModel(r#"["graph learning", "Node Classification"]"#);
        let service = EnrichService::new(store, Some(Arc::new(model)));
        let suggestions = service.suggest_tags(paper.id).await.unwrap();
        let names: Vec<_> = suggestions.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Node Classification"]);
    }

    #[tokio::test]
    async fn model_failure_falls_back_to_rule_classifier() {
        let store = Arc::new(MemoryStore::new());
        let paper = seed(&store, "Fraud detection system", "").await;
        let service = EnrichService::new(store, Some(Arc::new(FailingModel)));
        let suggestions = service.suggest_tags(paper.id).await.unwrap();
        assert!(suggestions.iter().any(|s| s.name == "Fraud Detection"));
    }

    #[tokio::test]
    async fn unparseable_model_text_falls_back_too() {
        let store = Arc::new(MemoryStore::new());
        let paper = seed(&store, "Reinforcement trading agents", "").await;
        let service = EnrichService::new(store, Some(Arc::new(JsonModel("no quotes at all"))));
        let suggestions = service.suggest_tags(paper.id).await.unwrap();
        assert!(suggestions.iter().any(|s| s.name == "RLHF"));
    }

    #[tokio::test]
    async fn summary_fallback_is_persisted() {
        let store = Arc::new(MemoryStore::new());
        let paper = seed(&store, "Credit scoring", "").await;
        let service = EnrichService::new(store.clone(), None);
        let summary = service.generate_summary(paper.id).await.unwrap();
        assert!(summary.contains("Credit scoring"));
        let stored = store.get_paper(paper.id).await.unwrap().unwrap();
        assert_eq!(stored.ai_summary.as_deref(), Some(summary.as_str()));
    }

    #[tokio::test]
    async fn user_tags_are_created_and_linked_once() {
        let store = Arc::new(MemoryStore::new());
        let paper = seed(&store, "Some paper", "").await;
        let service = EnrichService::new(store.clone(), None);

        let tag = service.add_user_tag(paper.id, "must read").await.unwrap();
        assert_eq!(tag.kind, TagKind::UserDefined);
        service.add_user_tag(paper.id, "must read").await.unwrap();
        assert_eq!(store.tags_for_paper(paper.id).await.unwrap().len(), 1);

        service.remove_tag(paper.id, tag.id).await.unwrap();
        assert!(store.tags_for_paper(paper.id).await.unwrap().is_empty());
    }
}
