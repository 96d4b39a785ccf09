use crate::types::{Chunk, FusedHit, MetadataFilter, SearchHit};

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    /// Deterministic within a session: the same text always yields the
    /// same L2-normalized vector of `dim()` components.
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

pub trait KeywordIndex: Send + Sync {
    fn index(&self, chunks: &[Chunk]) -> anyhow::Result<()>;
    fn search(&self, query: &str, k: usize) -> anyhow::Result<Vec<SearchHit>>;
}

#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    async fn index(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> anyhow::Result<()>;
    async fn search(&self, query_vec: &[f32], k: usize) -> anyhow::Result<Vec<SearchHit>>;
}

/// The seam between the recursive retrieval loop and the hybrid engine.
/// An empty result is a valid answer ("no evidence"), not an error.
#[async_trait::async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> anyhow::Result<Vec<FusedHit>>;
}
