use anyhow::Result;
use std::path::{Path, PathBuf};
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::Value;
use tantivy::{doc, Index, TantivyDocument};
use tracing::{debug, warn};

use ragdb_core::traits::KeywordIndex;
use ragdb_core::types::{Chunk, SearchHit, SourceKind};

use crate::segment::segment_text;
use crate::tantivy_utils::{build_schema, register_tokenizer};

pub struct TantivyIndexer {
    index: Index,
    id_field: tantivy::schema::Field,
    source_field: tantivy::schema::Field,
    text_field: tantivy::schema::Field,
    heading_field: tantivy::schema::Field,
}

impl TantivyIndexer {
    /// Start a fresh index, wiping any previous one at `index_dir`.
    /// Rebuilds are exclusive: nothing searches this directory while it
    /// is being rebuilt.
    pub fn create(index_dir: PathBuf) -> Result<Self> {
        if index_dir.exists() {
            std::fs::remove_dir_all(&index_dir)?;
        }
        std::fs::create_dir_all(&index_dir)?;
        let schema = build_schema();
        let index = Index::create_in_dir(&index_dir, schema)?;
        register_tokenizer(&index);
        Self::from_index(index)
    }

    /// Open an existing index for search. A missing or unreadable index
    /// surfaces as an error rather than an empty result set.
    pub fn open(index_dir: &Path) -> Result<Self> {
        let index = Index::open_in_dir(index_dir)?;
        register_tokenizer(&index);
        Self::from_index(index)
    }

    fn from_index(index: Index) -> Result<Self> {
        let schema = index.schema();
        let id_field = schema.get_field("id")?;
        let source_field = schema.get_field("source")?;
        let text_field = schema.get_field("text")?;
        let heading_field = schema.get_field("heading")?;
        Ok(Self { index, id_field, source_field, text_field, heading_field })
    }
}

impl KeywordIndex for TantivyIndexer {
    fn index(&self, chunks: &[Chunk]) -> anyhow::Result<()> {
        let mut index_writer = self.index.writer(50_000_000)?;
        for c in chunks {
            let doc = doc!(
                self.id_field => c.id.clone(),
                self.source_field => c.source.clone(),
                self.text_field => segment_text(&c.text),
                self.heading_field => segment_text(&c.heading_path.join(" ")),
            );
            index_writer.add_document(doc)?;
        }
        index_writer.commit()?;
        debug!(chunks = chunks.len(), "Committed keyword index batch");
        Ok(())
    }

    fn search(&self, query: &str, k: usize) -> anyhow::Result<Vec<SearchHit>> {
        let reader = self.index.reader()?;
        let searcher = reader.searcher();
        let qp = QueryParser::for_index(&self.index, vec![self.text_field, self.heading_field]);
        // Natural-language questions routinely contain characters the
        // query grammar reserves, so parse leniently and keep whatever
        // sub-queries survive.
        let (q, errors) = qp.parse_query_lenient(&segment_text(query));
        if !errors.is_empty() {
            warn!(?errors, "Dropped malformed parts of keyword query");
        }
        let top_docs = searcher.search(&q, &TopDocs::with_limit(k))?;
        let mut hits = Vec::new();
        for (score, addr) in top_docs {
            let doc: TantivyDocument = searcher.doc(addr)?;
            let id = doc
                .get_first(self.id_field)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            hits.push(SearchHit { id, score, source: SourceKind::Text });
        }
        Ok(hits)
    }
}
