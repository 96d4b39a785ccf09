use ragdb_core::chunker::Chunker;
use ragdb_core::config::ChunkingConfig;
use ragdb_core::traits::KeywordIndex;
use ragdb_core::types::{Chunk, SourceDocument};
use ragdb_text::TantivyIndexer;

fn chunks_for(source: &str, text: &str) -> Vec<Chunk> {
    let chunker = Chunker::new(ChunkingConfig { max_chars: 120, overlap_chars: 20 });
    chunker
        .chunk_document(&SourceDocument { source: source.to_string(), text: text.to_string() })
        .into_iter()
        .filter(|c| !c.is_parent())
        .collect()
}

#[test]
fn indexed_chunks_are_findable_by_keyword() {
    let dir = tempfile::tempdir().unwrap();
    let indexer = TantivyIndexer::create(dir.path().join("tantivy")).unwrap();
    let mut chunks = chunks_for("soup", "# Tomato Soup\nwash the tomatoes, cut into wedges, simmer gently");
    chunks.extend(chunks_for("salad", "# Cucumber Salad\nchop the cucumber and dress with vinegar"));
    indexer.index(&chunks).unwrap();

    let hits = indexer.search("tomatoes", 5).unwrap();
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|h| h.id.starts_with("soup:")));
}

#[test]
fn heading_terms_match_too() {
    let dir = tempfile::tempdir().unwrap();
    let indexer = TantivyIndexer::create(dir.path().join("tantivy")).unwrap();
    let chunks = chunks_for("soup", "# Tomato Soup\nwash cut simmer season serve");
    indexer.index(&chunks).unwrap();

    // "Soup" only appears in the heading path, not the body text.
    let hits = indexer.search("soup", 5).unwrap();
    assert!(!hits.is_empty());
}

#[test]
fn cjk_query_matches_cjk_content() {
    let dir = tempfile::tempdir().unwrap();
    let indexer = TantivyIndexer::create(dir.path().join("tantivy")).unwrap();
    let chunks = chunks_for("汤谱", "# 番茄汤\n洗净番茄 切块 下锅翻炒 加水煮沸");
    indexer.index(&chunks).unwrap();

    let hits = indexer.search("番茄汤怎么做", 5).unwrap();
    assert!(!hits.is_empty());
}

#[test]
fn malformed_query_syntax_does_not_error() {
    let dir = tempfile::tempdir().unwrap();
    let indexer = TantivyIndexer::create(dir.path().join("tantivy")).unwrap();
    let chunks = chunks_for("soup", "# Tomato Soup\nwash cut simmer");
    indexer.index(&chunks).unwrap();

    // Unbalanced quotes and reserved operators must not fail the search.
    let hits = indexer.search("\"tomato AND (simmer", 5);
    assert!(hits.is_ok());
}

#[test]
fn reopened_index_serves_same_results() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tantivy");
    {
        let indexer = TantivyIndexer::create(path.clone()).unwrap();
        indexer.index(&chunks_for("soup", "# Tomato Soup\nwash cut simmer season")).unwrap();
    }
    let reopened = TantivyIndexer::open(&path).unwrap();
    let hits = reopened.search("simmer", 5).unwrap();
    assert!(!hits.is_empty());
}
