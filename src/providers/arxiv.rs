//! arXiv provider
//!
//! Queries the public Atom feed at export.arxiv.org and normalizes entry
//! id/title/summary/published with a streaming quick-xml event loop.

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;

use super::{parse_publication_date, sentinel_date, RawPaper, SearchProvider};
use crate::errors::AppError;

const API_URL: &str = "http://export.arxiv.org/api/query";

pub struct ArxivProvider {
    client: reqwest::Client,
}

impl ArxivProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse an Atom feed body into normalized records. Entries without a title
/// are discarded; a missing summary becomes an empty abstract; a missing or
/// unparseable published date becomes the sentinel.
pub fn parse_feed(body: &str) -> Result<Vec<RawPaper>, AppError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    #[derive(Default)]
    struct Entry {
        id_url: String,
        title: String,
        summary: String,
        published: Option<String>,
        in_entry: bool,
        cur_text: String,
    }

    let mut cur = Entry::default();
    let mut papers = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name.ends_with("entry") {
                    cur = Entry::default();
                    cur.in_entry = true;
                }
            }
            Ok(Event::Text(t)) => {
                if cur.in_entry {
                    let txt = t.unescape().map(|t| t.to_string()).unwrap_or_default();
                    cur.cur_text.push_str(&txt);
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if cur.in_entry {
                    let txt = normalize_ws(&cur.cur_text);
                    if name.ends_with("id") {
                        cur.id_url = txt;
                    } else if name.ends_with("title") {
                        cur.title = txt;
                    } else if name.ends_with("summary") {
                        cur.summary = txt;
                    } else if name.ends_with("published") {
                        cur.published = (!txt.is_empty()).then_some(txt);
                    }
                    cur.cur_text.clear();

                    if name.ends_with("entry") {
                        cur.in_entry = false;
                        if !cur.title.is_empty() && !cur.id_url.is_empty() {
                            papers.push(RawPaper {
                                title: cur.title.clone(),
                                abstract_text: cur.summary.clone(),
                                url: cur.id_url.clone(),
                                source: "ArXiv".to_string(),
                                published_at: cur
                                    .published
                                    .as_deref()
                                    .map(parse_publication_date)
                                    .unwrap_or_else(sentinel_date),
                            });
                        }
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                return Err(AppError::ProviderResponse {
                    provider: "arxiv",
                    message: format!("invalid Atom feed: {e}"),
                })
            }
        }
        buf.clear();
    }

    Ok(papers)
}

#[async_trait]
impl SearchProvider for ArxivProvider {
    fn name(&self) -> &'static str {
        "arxiv"
    }

    fn matches_source(&self, source_name: &str) -> bool {
        source_name.to_lowercase().contains("arxiv")
    }

    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<RawPaper>, AppError> {
        let res = self
            .client
            .get(API_URL)
            .query(&[
                ("search_query", format!("all:{query}")),
                ("start", "0".to_string()),
                ("max_results", limit.to_string()),
                ("sortBy", "submittedDate".to_string()),
                ("sortOrder", "descending".to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::ProviderUnavailable {
                provider: "arxiv",
                message: e.to_string(),
            })?;

        if !res.status().is_success() {
            return Err(AppError::ProviderResponse {
                provider: "arxiv",
                message: format!("status {}", res.status()),
            });
        }

        let body = res.text().await.map_err(|e| AppError::ProviderResponse {
            provider: "arxiv",
            message: e.to_string(),
        })?;

        parse_feed(&body)
    }
}
