use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

use ragdb_core::config::{FusionConfig, RerankConfig, RetrievalConfig};
use ragdb_core::store::ChunkStore;
use ragdb_core::traits::{Embedder, KeywordIndex, Retriever, VectorIndex};
use ragdb_core::types::{FusedHit, MetadataFilter};

use crate::rerank::{Candidate, Reranker};
use crate::rrf;

/// Runs both retrieval methods for a query, fuses their ranked lists,
/// optionally reranks the fused pool, applies the metadata filter, and
/// truncates to k. Also owns index building at ingest time.
pub struct HybridEngine {
    store: Arc<ChunkStore>,
    keyword: Arc<dyn KeywordIndex>,
    vector: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    reranker: Option<Box<dyn Reranker>>,
    retrieval: RetrievalConfig,
    fusion: FusionConfig,
    rerank: RerankConfig,
}

impl HybridEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<ChunkStore>,
        keyword: Arc<dyn KeywordIndex>,
        vector: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        reranker: Option<Box<dyn Reranker>>,
        retrieval: RetrievalConfig,
        fusion: FusionConfig,
        rerank: RerankConfig,
    ) -> Self {
        Self { store, keyword, vector, embedder, reranker, retrieval, fusion, rerank }
    }

    /// Build both indexes from the store's child chunks. Returns the
    /// number of chunks indexed.
    pub async fn build_indexes(&self) -> Result<usize> {
        let children: Vec<_> =
            self.store.retrieval_chunks().into_iter().cloned().collect();
        let texts: Vec<String> = children.iter().map(|c| c.text.clone()).collect();
        let embedder = Arc::clone(&self.embedder);
        let embeddings =
            tokio::task::spawn_blocking(move || embedder.embed_batch(&texts)).await??;
        self.vector.index(&children, &embeddings).await?;
        let keyword = Arc::clone(&self.keyword);
        let keyword_chunks = children.clone();
        tokio::task::spawn_blocking(move || keyword.index(&keyword_chunks)).await??;
        Ok(children.len())
    }

    async fn retrieve_fused(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<FusedHit>> {
        let fetch = k.saturating_mul(self.retrieval.overfetch_factor).max(k);

        // Keyword search runs on a blocking thread while the query is
        // embedded and the vector search awaits.
        let keyword = Arc::clone(&self.keyword);
        let keyword_query = query.to_string();
        let keyword_task =
            tokio::task::spawn_blocking(move || keyword.search(&keyword_query, fetch));

        let embedder = Arc::clone(&self.embedder);
        let embed_query = query.to_string();
        let mut query_vecs =
            tokio::task::spawn_blocking(move || embedder.embed_batch(&[embed_query])).await??;
        let query_vec = query_vecs.remove(0);
        let vector_hits = self.vector.search(&query_vec, fetch).await?;
        let text_hits = keyword_task.await??;
        debug!(
            vector = vector_hits.len(),
            text = text_hits.len(),
            "Hybrid retrieval candidates"
        );

        let mut fused = rrf::fuse(&vector_hits, &text_hits, self.fusion.rrf_c);

        if self.rerank.enabled {
            if let Some(reranker) = &self.reranker {
                let pool_len = fused.len().min(self.rerank.pool);
                let tail = fused.split_off(pool_len);
                let mut pool: Vec<Candidate> = fused
                    .drain(..)
                    .filter_map(|hit| {
                        self.store.get(&hit.id).map(|chunk| Candidate {
                            id: hit.id,
                            score: hit.score,
                            text: chunk.text.clone(),
                        })
                    })
                    .collect();
                reranker.rerank(query, &mut pool);
                pool.sort_by(|a, b| {
                    b.score
                        .partial_cmp(&a.score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then(a.id.cmp(&b.id))
                });
                fused = pool
                    .into_iter()
                    .map(|c| FusedHit { id: c.id, score: c.score })
                    .collect();
                fused.extend(tail);
            }
        }

        // The filter removes candidates but never rescores survivors.
        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            fused.retain(|hit| self.store.get(&hit.id).is_some_and(|c| filter.matches(c)));
        }
        fused.truncate(k);
        Ok(fused)
    }
}

#[async_trait::async_trait]
impl Retriever for HybridEngine {
    async fn retrieve(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<FusedHit>> {
        self.retrieve_fused(query, k, filter).await
    }
}
