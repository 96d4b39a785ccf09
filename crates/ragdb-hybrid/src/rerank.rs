//! Optional rescoring of the fused candidate pool.

use ragdb_core::types::ChunkId;

/// A fused candidate with its text resolved, ready for rescoring.
pub struct Candidate {
    pub id: ChunkId,
    pub score: f32,
    pub text: String,
}

pub trait Reranker: Send + Sync {
    /// Adjust candidate scores in place. The caller re-sorts afterwards.
    fn rerank(&self, query: &str, pool: &mut [Candidate]);
}

/// Blends the fused score with the fraction of query tokens found in the
/// chunk text. Cheap, model-free, and enough to push exact-phrase
/// matches above loosely-related neighbours.
pub struct LexicalOverlapReranker;

impl Reranker for LexicalOverlapReranker {
    fn rerank(&self, query: &str, pool: &mut [Candidate]) {
        let query_lower = query.to_lowercase();
        let query_words: Vec<&str> = query_lower.split_whitespace().collect();
        if query_words.is_empty() {
            return;
        }
        for candidate in pool.iter_mut() {
            let text_lower = candidate.text.to_lowercase();
            let mut overlap = 0.0;
            for word in &query_words {
                if text_lower.contains(word) {
                    overlap += 1.0;
                }
            }
            candidate.score =
                candidate.score * 0.7 + (overlap / query_words.len() as f32) * 0.3;
        }
    }
}
