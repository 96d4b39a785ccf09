use anyhow::Result;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::DistanceType;

use ragdb_core::traits::VectorIndex;
use ragdb_core::types::{Chunk, SearchHit, SourceKind};

use crate::table::active_chunks_table;
use crate::writer::LanceVectorIndex;

impl LanceVectorIndex {
    /// Nearest neighbours of `query_vec` in the active table, cosine
    /// distance mapped to `score = 1 - distance`. A database with no
    /// active table is an empty corpus, not an error.
    pub async fn search_vec(&self, query_vec: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let Some(table_name) = active_chunks_table(&self.db).await? else {
            return Ok(Vec::new());
        };
        let table = self.db.open_table(&table_name).execute().await?;
        let mut stream = table
            .vector_search(query_vec.to_vec())?
            .distance_type(DistanceType::Cosine)
            .limit(k)
            .execute()
            .await?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            let ids = batch
                .column_by_name("id")
                .and_then(|c| c.as_any().downcast_ref::<arrow_array::StringArray>())
                .ok_or_else(|| anyhow::anyhow!("id column missing from {table_name}"))?;
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<arrow_array::Float32Array>());
            for i in 0..batch.num_rows() {
                let score = distances.map_or(0.0, |d| 1.0 - d.value(i));
                hits.push(SearchHit {
                    id: ids.value(i).to_string(),
                    score,
                    source: SourceKind::Vector,
                });
            }
        }
        Ok(hits)
    }
}

#[async_trait::async_trait]
impl VectorIndex for LanceVectorIndex {
    async fn index(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
        self.rebuild(chunks, embeddings).await
    }

    async fn search(&self, query_vec: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.search_vec(query_vec, k).await
    }
}
