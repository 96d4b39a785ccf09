//! In-memory chunk store with JSON persistence.
//!
//! The store is the system of record for chunk text and metadata; the
//! keyword and vector indexes only ever return chunk ids, which are
//! resolved here. Parents live alongside children but are excluded from
//! the indexed set.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::types::{Chunk, ChunkId};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ChunkStore {
    chunks: HashMap<ChunkId, Chunk>,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_chunks(&mut self, chunks: Vec<Chunk>) {
        for chunk in chunks {
            self.chunks.insert(chunk.id.clone(), chunk);
        }
    }

    pub fn get(&self, id: &str) -> Option<&Chunk> {
        self.chunks.get(id)
    }

    /// Resolve the section-level chunk containing `id`, if any. Parent
    /// chunks have no parent themselves.
    pub fn parent_of(&self, id: &str) -> Option<&Chunk> {
        let chunk = self.chunks.get(id)?;
        let parent_id = chunk.parent_id.as_ref()?;
        self.chunks.get(parent_id)
    }

    /// Child chunks only, in (source, position) order. This is the set
    /// handed to both indexes at build time.
    pub fn retrieval_chunks(&self) -> Vec<&Chunk> {
        let mut children: Vec<&Chunk> =
            self.chunks.values().filter(|c| !c.is_parent()).collect();
        children.sort_by(|a, b| (&a.source, a.position).cmp(&(&b.source, b.position)));
        children
    }

    /// Distinct source document names, sorted.
    pub fn sources(&self) -> Vec<String> {
        let mut sources: Vec<String> =
            self.chunks.values().map(|c| c.source.clone()).collect();
        sources.sort();
        sources.dedup();
        sources
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| Error::Operation(format!("create {}: {e}", dir.display())))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Operation(format!("serialize chunk store: {e}")))?;
        fs::write(path, json)
            .map_err(|e| Error::Operation(format!("write {}: {e}", path.display())))?;
        info!(chunks = self.chunks.len(), path = %path.display(), "Saved chunk store");
        Ok(())
    }

    /// Load a persisted store. A missing file is an error at this level;
    /// callers that want "empty corpus" semantics check existence first.
    /// A present-but-unreadable file is a hard error, never an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| Error::CorruptStore {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let store: Self = serde_json::from_str(&raw).map_err(|e| Error::CorruptStore {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        info!(chunks = store.chunks.len(), path = %path.display(), "Loaded chunk store");
        Ok(store)
    }
}
