//! Sub-query expansion for list-intent questions.
//!
//! A list question ("list all recipes using chicken") is broader than
//! one retrieval query can cover; expansion produces several queries
//! whose results the controller merges in round 0.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::llm::{complete_with_retry, extract_json_object, ChatModel};

#[async_trait]
pub trait QueryExpander: Send + Sync {
    /// Return the queries for round 0, the original first. Never empty.
    async fn expand(&self, query: &str) -> Vec<String>;
}

/// Model-free expansion: the original query plus a keyword-only variant
/// with routing words stripped, so BM25 sees the content terms undiluted.
pub struct RuleExpander;

const ROUTING_WORDS: &[&str] = &[
    "list", "all", "the", "every", "each", "which", "what", "using", "with", "that",
    "contain", "contains", "include", "includes", "recipes", "dishes", "me", "please",
    "列出", "所有", "哪些", "有什么", "全部",
];

fn keyword_variant(query: &str) -> Option<String> {
    let kept: Vec<&str> = query
        .split_whitespace()
        .filter(|w| {
            let lowered = w.to_lowercase();
            !ROUTING_WORDS.contains(&lowered.trim_matches(|c: char| !c.is_alphanumeric()))
        })
        .collect();
    if kept.is_empty() {
        return None;
    }
    let variant = kept.join(" ");
    if variant.eq_ignore_ascii_case(query.trim()) {
        None
    } else {
        Some(variant)
    }
}

#[async_trait]
impl QueryExpander for RuleExpander {
    async fn expand(&self, query: &str) -> Vec<String> {
        let mut queries = vec![query.to_string()];
        if let Some(variant) = keyword_variant(query) {
            queries.push(variant);
        }
        queries
    }
}

/// Asks the model for sub-queries as JSON; on failure or unusable output
/// it degrades to the rule expansion.
pub struct LlmExpander {
    model: Arc<dyn ChatModel>,
    max_retries: usize,
    max_sub_queries: usize,
}

impl LlmExpander {
    pub fn new(model: Arc<dyn ChatModel>, max_retries: usize) -> Self {
        Self { model, max_retries, max_sub_queries: 4 }
    }
}

const EXPAND_SYSTEM: &str = "You split a broad search request into focused search \
queries for a document index. Reply with a JSON object only: \
{\"queries\": [\"...\", \"...\"]}";

#[async_trait]
impl QueryExpander for LlmExpander {
    async fn expand(&self, query: &str) -> Vec<String> {
        let reply =
            match complete_with_retry(self.model.as_ref(), EXPAND_SYSTEM, query, self.max_retries)
                .await
            {
                Ok(reply) => reply,
                Err(e) => {
                    debug!(error = %e, "Expansion call failed, using rule expansion");
                    return RuleExpander.expand(query).await;
                }
            };
        let sub_queries: Vec<String> = extract_json_object(&reply)
            .and_then(|v| v["queries"].as_array().cloned())
            .map(|arr| {
                arr.iter()
                    .filter_map(|q| q.as_str())
                    .map(str::trim)
                    .filter(|q| !q.is_empty())
                    .map(str::to_string)
                    .take(self.max_sub_queries)
                    .collect()
            })
            .unwrap_or_default();
        if sub_queries.is_empty() {
            return RuleExpander.expand(query).await;
        }
        let mut queries = vec![query.to_string()];
        for sub in sub_queries {
            if !queries.iter().any(|q| q.eq_ignore_ascii_case(&sub)) {
                queries.push(sub);
            }
        }
        queries
    }
}
