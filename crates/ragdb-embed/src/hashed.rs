use anyhow::Result;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use ragdb_core::traits::Embedder;

/// Deterministic bag-of-tokens embedder: each token hashes to one bucket
/// of the vector, and the result is L2-normalized. Texts sharing tokens
/// land near each other, which is all hybrid-retrieval tests need. Not a
/// semantic model.
pub struct HashedEmbedder {
    dim: usize,
}

impl HashedEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Embedder for HashedEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        usize::MAX
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0f32; self.dim];
                for (i, token) in text.split_whitespace().enumerate() {
                    let mut hasher = XxHash64::with_seed(0);
                    token.hash(&mut hasher);
                    let h = hasher.finish();
                    let idx = (h as usize) % self.dim;
                    let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
                    v[idx] += val + (i as f32 % 3.0) * 0.01;
                }
                let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
                for x in &mut v {
                    *x /= norm;
                }
                v
            })
            .collect())
    }
}
