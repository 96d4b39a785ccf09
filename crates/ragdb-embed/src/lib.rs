//! Dense embeddings for retrieval: a local BGE-M3 model via candle, plus
//! a deterministic hash-based stand-in for tests and offline runs.

pub mod device;
pub mod hashed;
pub mod model;
pub mod pool;
pub mod tokenize;

use anyhow::Result;
use ragdb_core::traits::Embedder;
use tracing::info;

pub const EMBEDDING_DIM: usize = 1024;

/// Pick the embedder for this process. `APP_USE_FAKE_EMBEDDINGS=1` (or
/// `true`) selects the hash embedder; otherwise the BGE-M3 model is
/// loaded from disk.
pub fn get_default_embedder() -> Result<Box<dyn Embedder>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if use_fake {
        info!("Using hash-based embedder");
        return Ok(Box::new(hashed::HashedEmbedder::new(EMBEDDING_DIM)));
    }
    Ok(Box::new(model::EmbeddingModel::new()?))
}
