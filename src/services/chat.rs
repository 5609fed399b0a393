//! Chat over the stored corpus
//!
//! Keyword retrieval (no vector search by design) plus a grounded answer
//! from the generative service, with a deterministic templated fallback.

use serde::Serialize;
use std::sync::Arc;

use crate::db::{PaperQuery, PaperWithTags, Store};
use crate::errors::AppError;
use crate::llm::{ChatMessage, ChatModel};

/// At most this many papers feed the answer context.
const RETRIEVAL_LIMIT: u64 = 5;

/// Tokens this short are noise (stop-words, articles) and are discarded.
const MIN_TOKEN_LEN: usize = 4;

/// Abstract excerpt length in the fallback digest.
const DIGEST_CHARS: usize = 200;

const NO_RESULTS_MESSAGE: &str = "I couldn't find any papers in your repository matching that \
     query. Try running a collection for relevant topics first, or ask me something broader.";

const SYSTEM_PROMPT: &str = "You are a research assistant helping analyze a collection of \
     academic papers. Answer questions based ONLY on the provided paper context. Be specific, \
     cite paper titles, and provide detailed explanations. If asked for examples or deep \
     dives, quote relevant sections from abstracts.";

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub answer: String,
    pub sources: Vec<PaperWithTags>,
}

/// Whitespace tokenization, lowercased, short tokens dropped.
pub fn tokenize(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .filter(|t| t.len() >= MIN_TOKEN_LEN)
        .collect()
}

fn build_context(papers: &[PaperWithTags]) -> String {
    papers
        .iter()
        .enumerate()
        .map(|(idx, p)| {
            let tags = if p.tags.is_empty() {
                "No tags".to_string()
            } else {
                p.tags.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", ")
            };
            let abstract_text = if p.paper.abstract_text.is_empty() {
                "No abstract available"
            } else {
                &p.paper.abstract_text
            };
            format!(
                "[Paper {}]\nTitle: {}\nTags: {}\nAbstract: {}\nSource: {}\nPublication Date: {}\n---",
                idx + 1,
                p.paper.title,
                tags,
                abstract_text,
                p.paper.source,
                p.paper.published_at.format("%Y-%m-%d"),
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Deterministic answer used when no model is configured or the call fails.
fn fallback_response(query: &str, papers: &[PaperWithTags]) -> String {
    let lower = query.to_lowercase();
    if lower.contains("summary") || lower.contains("summarize") {
        let digest = papers
            .iter()
            .take(3)
            .enumerate()
            .map(|(i, p)| {
                let excerpt: String = p.paper.abstract_text.chars().take(DIGEST_CHARS).collect();
                format!("{}. **{}**\n   {}...\n", i + 1, p.paper.title, excerpt)
            })
            .collect::<Vec<_>>()
            .join("\n");
        return format!("**Summary of Found Papers:**\n\n{digest}");
    }

    let titles = papers
        .iter()
        .map(|p| format!("\"{}\"", p.paper.title))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "I found {} relevant papers: {}.\n\n**Note:** Detailed analysis requires a configured \
         generative-service credential. Currently using basic fallback mode.",
        papers.len(),
        titles
    )
}

pub struct ChatService {
    store: Arc<dyn Store>,
    llm: Option<Arc<dyn ChatModel>>,
}

impl ChatService {
    pub fn new(store: Arc<dyn Store>, llm: Option<Arc<dyn ChatModel>>) -> Self {
        Self { store, llm }
    }

    /// Keyword retrieval: any-token substring match over title or abstract.
    /// Zero usable tokens short-circuits without touching storage.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<PaperWithTags>, AppError> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return Ok(vec![]);
        }

        let criteria = PaperQuery {
            title_contains: tokens.clone(),
            abstract_contains: tokens,
            tag_name_in: vec![],
        };
        self.store.find_papers(&criteria, RETRIEVAL_LIMIT).await
    }

    pub async fn chat(&self, query: &str) -> Result<ChatReply, AppError> {
        let sources = self.retrieve(query).await?;
        metrics::counter!("paperharvest_chat_requests_total").increment(1);

        if sources.is_empty() {
            return Ok(ChatReply {
                answer: NO_RESULTS_MESSAGE.to_string(),
                sources,
            });
        }

        let answer = match &self.llm {
            Some(llm) => {
                let messages = vec![
                    ChatMessage::system(SYSTEM_PROMPT),
                    ChatMessage::user(format!(
                        "Context (Papers in Repository):\n{}\n\nUser Question: {}\n\n\
                         Please provide a detailed, specific answer based on these papers. \
                         If asked for examples, cite specific papers and their content.",
                        build_context(&sources),
                        query
                    )),
                ];
                match llm.complete(&messages, 1000).await {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(error = %e, "Answer generation failed, using fallback");
                        fallback_response(query, &sources)
                    }
                }
            }
            None => fallback_response(query, &sources),
        };

        Ok(ChatReply { answer, sources })
    }
}
