//! Answer generation from accumulated evidence.
//!
//! Builds an intent-specific prompt with `[chunk_id]`-tagged context
//! (expanded to parent sections when they fit the budget) and calls the
//! model. Empty evidence never reaches the model, and a model that stays
//! down after retries still returns the evidence it would have used.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use ragdb_core::config::{GenerationConfig, LlmConfig};
use ragdb_core::store::ChunkStore;
use ragdb_core::types::{ChunkId, Intent};

use crate::controller::EvidenceHit;
use crate::llm::{complete_with_retry, ChatModel};

/// The three answer shapes. `InsufficientEvidence` and `Unavailable` are
/// recovered conditions, not errors.
#[derive(Debug)]
pub enum Answer {
    Answered { text: String, citations: Vec<ChunkId> },
    InsufficientEvidence,
    Unavailable { evidence: Vec<ChunkId> },
}

/// Streaming variant: fragments arrive in order until the channel
/// closes; the consumer extracts citations from the collected text with
/// [`extract_citations`].
pub enum StreamedAnswer {
    Streaming { fragments: mpsc::Receiver<String>, context_ids: Vec<ChunkId> },
    InsufficientEvidence,
    Unavailable { evidence: Vec<ChunkId> },
}

pub struct Generator {
    model: Arc<dyn ChatModel>,
    store: Arc<ChunkStore>,
    generation: GenerationConfig,
    max_retries: usize,
}

impl Generator {
    pub fn new(
        model: Arc<dyn ChatModel>,
        store: Arc<ChunkStore>,
        generation: GenerationConfig,
        llm: &LlmConfig,
    ) -> Self {
        Self { model, store, generation, max_retries: llm.max_retries }
    }

    pub async fn generate(
        &self,
        question: &str,
        intent: Intent,
        evidence: &[EvidenceHit],
    ) -> Answer {
        if evidence.is_empty() {
            return Answer::InsufficientEvidence;
        }
        let (context, context_ids) = self.build_context(evidence);
        let user = build_user_prompt(question, intent, &context);
        match complete_with_retry(self.model.as_ref(), SYSTEM_PROMPT, &user, self.max_retries)
            .await
        {
            Ok(text) => {
                let citations = extract_citations(&text, &context_ids);
                Answer::Answered { text, citations }
            }
            Err(e) => {
                warn!(error = %e, "Generation failed after retries");
                Answer::Unavailable { evidence: context_ids }
            }
        }
    }

    pub async fn generate_streamed(
        &self,
        question: &str,
        intent: Intent,
        evidence: &[EvidenceHit],
    ) -> StreamedAnswer {
        if evidence.is_empty() {
            return StreamedAnswer::InsufficientEvidence;
        }
        let (context, context_ids) = self.build_context(evidence);
        let user = build_user_prompt(question, intent, &context);
        let mut attempt = 0usize;
        loop {
            match self.model.complete_stream(SYSTEM_PROMPT, &user).await {
                Ok(fragments) => {
                    return StreamedAnswer::Streaming { fragments, context_ids };
                }
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = std::time::Duration::from_millis(500 * (1 << attempt.min(4)));
                    warn!(attempt, error = %e, "Retrying streamed generation");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(error = %e, "Streamed generation failed after retries");
                    return StreamedAnswer::Unavailable { evidence: context_ids };
                }
            }
        }
    }

    /// Render evidence into the `[chunk_id] text` context block. Parent
    /// section text replaces the child's when enabled and within budget;
    /// the citation tag stays the child's id either way.
    fn build_context(&self, evidence: &[EvidenceHit]) -> (String, Vec<ChunkId>) {
        let mut context = String::new();
        let mut context_ids = Vec::new();
        let mut included_parents: Vec<ChunkId> = Vec::new();
        for hit in evidence {
            let Some(chunk) = self.store.get(&hit.id) else {
                debug!(id = %hit.id, "Evidence id missing from store, skipping");
                continue;
            };
            let text = if self.generation.include_parents {
                match self.store.parent_of(&hit.id) {
                    // One copy of a section is enough even when several
                    // of its children were retrieved.
                    Some(parent) if included_parents.contains(&parent.id) => continue,
                    Some(parent) => {
                        included_parents.push(parent.id.clone());
                        parent.text.as_str()
                    }
                    None => chunk.text.as_str(),
                }
            } else {
                chunk.text.as_str()
            };
            let heading = chunk.heading_path.join(" > ");
            let entry = if heading.is_empty() {
                format!("[{}] {}\n", chunk.id, text)
            } else {
                format!("[{}] ({}) {}\n", chunk.id, heading, text)
            };
            if context.chars().count() + entry.chars().count()
                > self.generation.max_context_chars
            {
                break;
            }
            context.push_str(&entry);
            context_ids.push(chunk.id.clone());
        }
        (context, context_ids)
    }
}

const SYSTEM_PROMPT: &str = "You answer questions strictly from the provided context \
passages. Each passage is tagged with its id in square brackets. Cite the tags of the \
passages you use, like [source:3]. If the context does not contain the answer, say \
that you do not have enough information.";

fn build_user_prompt(question: &str, intent: Intent, context: &str) -> String {
    let instructions = match intent {
        Intent::List => {
            "1. Enumerate every item from the context that matches the question.\n\
             2. One line per item, with its citation tag.\n\
             3. Do not invent items that are not in the context."
        }
        Intent::Detail => {
            "1. Answer with full detail from the context (ingredients, amounts, steps).\n\
             2. Keep the original order of any steps.\n\
             3. Cite the passages that support each part of the answer."
        }
        Intent::General => {
            "1. Answer concisely using only the context.\n\
             2. Cite the passages you relied on."
        }
    };
    format!("Context:\n{context}\nQuestion: {question}\n\nInstructions:\n{instructions}")
}

/// Best-effort attribution: ids whose `[tag]` appears in the answer, in
/// first-appearance order. An answer with no recognizable tags falls
/// back to the full context id list; ids outside the context are never
/// reported.
pub fn extract_citations(text: &str, context_ids: &[ChunkId]) -> Vec<ChunkId> {
    let mut found: Vec<(usize, ChunkId)> = Vec::new();
    for id in context_ids {
        let tag = format!("[{id}]");
        if let Some(pos) = text.find(&tag) {
            found.push((pos, id.clone()));
        }
    }
    if found.is_empty() {
        return context_ids.to_vec();
    }
    found.sort_by_key(|(pos, _)| *pos);
    found.into_iter().map(|(_, id)| id).collect()
}
