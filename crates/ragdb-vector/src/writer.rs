use anyhow::{ensure, Result};
use chrono::Utc;
use lancedb::Connection;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use arrow_array::{FixedSizeListArray, Int32Array, RecordBatch, RecordBatchIterator, StringArray};

use ragdb_core::types::Chunk;

use crate::schema::{build_arrow_schema, EMBEDDING_DIM};
use crate::table::{active_chunks_table, open_db, set_meta, ACTIVE_CHUNKS_KEY};

const INSERT_BATCH_SIZE: usize = 1000;

pub struct LanceVectorIndex {
    pub(crate) db: Connection,
}

impl LanceVectorIndex {
    pub async fn new(db_path: &Path) -> Result<Self> {
        let db = open_db(db_path.to_string_lossy().as_ref()).await?;
        Ok(Self { db })
    }

    /// Rebuild the vector index from scratch: write all rows into a fresh
    /// versioned table, flip the active pointer, then drop the old table.
    /// Readers keep hitting the previous table until the flip.
    pub async fn rebuild(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
        ensure!(
            chunks.len() == embeddings.len(),
            "chunks ({}) and embeddings ({}) length mismatch",
            chunks.len(),
            embeddings.len()
        );
        let new_table = format!("chunks_{}", Utc::now().timestamp_millis());
        let previous = active_chunks_table(&self.db).await?;

        for (batch_chunks, batch_embeddings) in chunks
            .chunks(INSERT_BATCH_SIZE)
            .zip(embeddings.chunks(INSERT_BATCH_SIZE))
        {
            self.insert_batch(&new_table, batch_chunks, batch_embeddings).await?;
        }
        if chunks.is_empty() {
            // Still create the (empty) table so the pointer stays valid.
            let iter = RecordBatchIterator::new(vec![].into_iter(), build_arrow_schema());
            self.db.create_table(&new_table, Box::new(iter)).execute().await?;
        }
        set_meta(&self.db, ACTIVE_CHUNKS_KEY, &new_table).await?;
        if let Some(old) = previous {
            if old != new_table {
                self.db.drop_table(&old).await?;
            }
        }
        info!(table = %new_table, rows = chunks.len(), "Vector index rebuilt");
        Ok(())
    }

    async fn insert_batch(
        &self,
        table_name: &str,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let record_batch = chunks_to_record_batch(chunks, embeddings)?;
        let schema = record_batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
        if self.db.table_names().execute().await?.contains(&table_name.to_string()) {
            self.db.open_table(table_name).execute().await?.add(reader).execute().await?;
        } else {
            self.db.create_table(table_name, reader).execute().await?;
        }
        Ok(())
    }
}

fn chunks_to_record_batch(chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<RecordBatch> {
    let schema = build_arrow_schema();
    let mut ids = Vec::new();
    let mut sources = Vec::new();
    let mut positions = Vec::new();
    let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::new();
    for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
        ensure!(
            embedding.len() == EMBEDDING_DIM as usize,
            "embedding for {} has {} components, expected {}",
            chunk.id,
            embedding.len(),
            EMBEDDING_DIM
        );
        ids.push(chunk.id.clone());
        sources.push(chunk.source.clone());
        positions.push(chunk.position as i32);
        vectors.push(Some(embedding.iter().map(|&x| Some(x)).collect()));
    }
    let record_batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(sources)),
            Arc::new(Int32Array::from(positions)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(
                vectors.into_iter(),
                EMBEDDING_DIM,
            )),
        ],
    )?;
    Ok(record_batch)
}
