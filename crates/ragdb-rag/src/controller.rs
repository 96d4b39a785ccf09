//! The bounded recursive retrieval loop.
//!
//! Rounds are strictly sequential: retrieve with the current query,
//! merge new hits, ask the assessor whether the evidence suffices, and
//! either stop or continue with the proposed follow-up query. The loop
//! always terminates: on sufficiency, on the round cap, when a round
//! adds no new chunk ids, or when the wall-clock budget runs out, and
//! always emits whatever evidence accumulated.

use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use ragdb_core::config::{RecursionConfig, RetrievalConfig};
use ragdb_core::store::ChunkStore;
use ragdb_core::traits::Retriever;
use ragdb_core::types::{ChunkId, Intent, MetadataFilter};

use crate::assess::Assessor;
use crate::expand::QueryExpander;

/// One accumulated hit: the fused score and round it was first seen in.
/// Later rounds never re-score a chunk already present.
#[derive(Debug, Clone)]
pub struct EvidenceHit {
    pub id: ChunkId,
    pub score: f32,
    pub round: usize,
}

/// Per-question loop state; discarded when the question completes.
#[derive(Debug)]
pub struct QueryState {
    pub original_query: String,
    pub current_query: String,
    pub round: usize,
    pub seen: HashSet<ChunkId>,
    pub evidence: Vec<EvidenceHit>,
    pub exhausted: bool,
}

impl QueryState {
    fn new(query: &str) -> Self {
        Self {
            original_query: query.to_string(),
            current_query: query.to_string(),
            round: 0,
            seen: HashSet::new(),
            evidence: Vec::new(),
            exhausted: false,
        }
    }
}

pub struct RecursiveController {
    retriever: Arc<dyn Retriever>,
    assessor: Arc<dyn Assessor>,
    expander: Arc<dyn QueryExpander>,
    store: Arc<ChunkStore>,
    retrieval: RetrievalConfig,
    recursion: RecursionConfig,
}

impl RecursiveController {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        assessor: Arc<dyn Assessor>,
        expander: Arc<dyn QueryExpander>,
        store: Arc<ChunkStore>,
        retrieval: RetrievalConfig,
        recursion: RecursionConfig,
    ) -> Self {
        Self { retriever, assessor, expander, store, retrieval, recursion }
    }

    /// Run the loop for a routed question. The returned evidence is
    /// ordered by (round first seen, fused score descending, id) and
    /// truncated to the evidence cap.
    pub async fn run(
        &self,
        question: &str,
        intent: Intent,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<EvidenceHit>> {
        let k = self.retrieval.k_for(intent);
        let deadline = self
            .recursion
            .wall_clock_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms));
        let mut state = QueryState::new(question);

        // List questions fan out over expanded sub-queries in round 0;
        // later rounds always use the single follow-up query.
        let round_zero_queries = if intent == Intent::List {
            self.expander.expand(question).await
        } else {
            vec![question.to_string()]
        };

        loop {
            let queries: Vec<String> = if state.round == 0 {
                round_zero_queries.clone()
            } else {
                vec![state.current_query.clone()]
            };

            let mut new_ids = 0usize;
            for query in &queries {
                let hits = self.retriever.retrieve(query, k, filter).await?;
                for hit in hits {
                    if state.seen.insert(hit.id.clone()) {
                        state.evidence.push(EvidenceHit {
                            id: hit.id,
                            score: hit.score,
                            round: state.round,
                        });
                        new_ids += 1;
                    }
                }
            }
            debug!(round = state.round, new_ids, total = state.evidence.len(), "Retrieval round");

            if new_ids == 0 {
                state.exhausted = true;
                break;
            }
            if state.round + 1 >= self.recursion.max_rounds {
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }

            let evidence_texts = self.evidence_texts(&state.evidence);
            let decision = self.assessor.assess(&state.original_query, &evidence_texts).await;
            if decision.sufficient {
                break;
            }
            let Some(next_query) = decision.next_query else {
                break;
            };
            state.current_query = next_query;
            state.round += 1;
        }

        let mut evidence = state.evidence;
        evidence.sort_by(|a, b| {
            a.round
                .cmp(&b.round)
                .then(b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal))
                .then(a.id.cmp(&b.id))
        });
        evidence.truncate(self.retrieval.final_evidence_k);
        Ok(evidence)
    }

    fn evidence_texts(&self, evidence: &[EvidenceHit]) -> Vec<String> {
        evidence
            .iter()
            .filter_map(|hit| self.store.get(&hit.id))
            .map(|chunk| chunk.text.clone())
            .collect()
    }
}
