//! Keyword (BM25) retrieval over chunk text, backed by tantivy.

pub mod index;
pub mod segment;
pub mod tantivy_utils;

pub use index::TantivyIndexer;
