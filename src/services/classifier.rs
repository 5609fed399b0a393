//! Tag classifier
//!
//! The rule mode is a pure, total function over title + abstract: a fixed
//! ordered table of substring sets, each emitting one or more tags. The
//! assisted mode (see `enrich`) asks the generative service for topic
//! phrases; the parsing and recovery helpers for that live here so they can
//! be tested without any service.

use serde::Serialize;

use crate::db::TagKind;
use crate::llm::ChatMessage;

/// Assisted suggestions are capped to this many entries.
pub const MAX_SUGGESTIONS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestedTag {
    pub name: String,
    pub kind: TagKind,
}

struct Rule {
    keywords: &'static [&'static str],
    tags: &'static [(&'static str, TagKind)],
}

const RULES: &[Rule] = &[
    // Industrial categories
    Rule {
        keywords: &["compliance", "aml", "laundering"],
        tags: &[("AML Compliance & Control", TagKind::Industrial)],
    },
    Rule {
        keywords: &["risk", "credit", "default"],
        tags: &[("Investment Risk Control", TagKind::Industrial)],
    },
    Rule {
        keywords: &["fraud", "detection"],
        tags: &[("Fraud Detection", TagKind::Industrial)],
    },
    Rule {
        keywords: &["kyc", "cdd", "due diligence", "onboarding"],
        tags: &[("eKYC & CDD", TagKind::Industrial)],
    },
    Rule {
        keywords: &["portfolio", "trading", "asset"],
        tags: &[("Portfolio Optimization", TagKind::Industrial)],
    },
    Rule {
        keywords: &["servicing", "customer"],
        tags: &[("Customer Servicing", TagKind::Industrial)],
    },
    // Academic categories
    Rule {
        keywords: &["agent", "autonomous", "multi-agent"],
        tags: &[
            ("Agent Designing", TagKind::Academic),
            ("Agentic AI Pipeline", TagKind::Academic),
        ],
    },
    Rule {
        keywords: &["llm", "language model", "gpt", "bert"],
        tags: &[("LLM SFT", TagKind::Academic)],
    },
    Rule {
        keywords: &["reinforcement", "rl", "q-network"],
        tags: &[("RLHF", TagKind::Academic)],
    },
];

/// Deterministic rule-based classification. Never fails, never calls out.
pub fn classify(title: &str, abstract_text: &str) -> Vec<SuggestedTag> {
    let text = format!("{title} {abstract_text}").to_lowercase();

    let mut tags: Vec<SuggestedTag> = Vec::new();
    for rule in RULES {
        if rule.keywords.iter().any(|k| text.contains(k)) {
            for (name, kind) in rule.tags {
                let tag = SuggestedTag {
                    name: (*name).to_string(),
                    kind: *kind,
                };
                if !tags.contains(&tag) {
                    tags.push(tag);
                }
            }
        }
    }
    tags
}

/// Prompt for the assisted suggestion mode.
pub fn tag_prompt(title: &str, abstract_text: &str) -> Vec<ChatMessage> {
    let abstract_text = if abstract_text.is_empty() {
        "No abstract available"
    } else {
        abstract_text
    };
    vec![ChatMessage::user(format!(
        "You are a research paper analyst. Analyze the following paper and \
         extract 3-5 specific, relevant research topics or keywords that best \
         describe this paper.\n\nTitle: {title}\n\nAbstract: {abstract_text}\n\n\
         Instructions:\n\
         - Return ONLY a JSON array of strings\n\
         - Each tag should be a specific research topic, technology, or domain area\n\
         - Keep tags concise (2-4 words max)\n\
         - Focus on technical/academic terms, not generic words\n\
         - Example format: [\"Graph Neural Networks\", \"Semi-Supervised Learning\", \"Node Classification\"]\n\n\
         Tags:"
    ))]
}

/// Parse the raw model text: a JSON array of strings first, then quoted
/// substrings as a recovery heuristic. Capped to `MAX_SUGGESTIONS`; empty
/// on total failure (the caller then falls back to `classify`).
pub fn parse_tag_list(text: &str) -> Vec<String> {
    if let Ok(serde_json::Value::Array(items)) = serde_json::from_str::<serde_json::Value>(text) {
        return items
            .into_iter()
            .filter_map(|v| match v {
                serde_json::Value::String(s) if !s.is_empty() => Some(s),
                _ => None,
            })
            .take(MAX_SUGGESTIONS)
            .collect();
    }

    // Not valid JSON: pull out whatever is inside double quotes
    text.split('"')
        .skip(1)
        .step_by(2)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .take(MAX_SUGGESTIONS)
        .collect()
}
