use ragdb_core::traits::{Embedder, VectorIndex};
use ragdb_core::types::Chunk;
use ragdb_embed::hashed::HashedEmbedder;
use ragdb_embed::EMBEDDING_DIM;
use ragdb_vector::LanceVectorIndex;

fn chunk(id: &str, source: &str, position: usize, text: &str) -> Chunk {
    Chunk {
        id: id.to_string(),
        source: source.to_string(),
        heading_path: vec![],
        text: text.to_string(),
        position,
        parent_id: Some(format!("{source}:0")),
    }
}

fn sample_corpus() -> (Vec<Chunk>, Vec<Vec<f32>>) {
    let chunks = vec![
        chunk("soup:1", "soup", 1, "wash tomatoes cut wedges simmer gently"),
        chunk("soup:2", "soup", 2, "season with salt and sugar before serving"),
        chunk("salad:1", "salad", 1, "chop cucumber dress with vinegar"),
    ];
    let embedder = HashedEmbedder::new(EMBEDDING_DIM);
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = embedder.embed_batch(&texts).unwrap();
    (chunks, embeddings)
}

#[tokio::test]
async fn search_on_fresh_db_returns_empty() {
    let dir = tempfile::tempdir().unwrap();
    let index = LanceVectorIndex::new(dir.path()).await.unwrap();
    let query = vec![0.0f32; EMBEDDING_DIM];
    let hits = index.search(&query, 5).await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn indexed_chunks_are_retrievable_by_similarity() {
    let dir = tempfile::tempdir().unwrap();
    let index = LanceVectorIndex::new(dir.path()).await.unwrap();
    let (chunks, embeddings) = sample_corpus();
    index.index(&chunks, &embeddings).await.unwrap();

    let embedder = HashedEmbedder::new(EMBEDDING_DIM);
    let query = embedder.embed_batch(&["wash tomatoes simmer".to_string()]).unwrap().remove(0);
    let hits = index.search(&query, 2).await.unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].id, "soup:1");
}

#[tokio::test]
async fn reopened_db_serves_same_top_hit() {
    let dir = tempfile::tempdir().unwrap();
    let (chunks, embeddings) = sample_corpus();
    {
        let index = LanceVectorIndex::new(dir.path()).await.unwrap();
        index.index(&chunks, &embeddings).await.unwrap();
    }
    let reopened = LanceVectorIndex::new(dir.path()).await.unwrap();
    let embedder = HashedEmbedder::new(EMBEDDING_DIM);
    let query = embedder.embed_batch(&["chop cucumber vinegar".to_string()]).unwrap().remove(0);
    let hits = reopened.search(&query, 1).await.unwrap();
    assert_eq!(hits[0].id, "salad:1");
}

#[tokio::test]
async fn rebuild_replaces_previous_contents() {
    let dir = tempfile::tempdir().unwrap();
    let index = LanceVectorIndex::new(dir.path()).await.unwrap();
    let (chunks, embeddings) = sample_corpus();
    index.index(&chunks, &embeddings).await.unwrap();

    // Second build with only the salad chunk; soup rows must be gone.
    let keep: Vec<Chunk> = chunks.into_iter().filter(|c| c.source == "salad").collect();
    let embedder = HashedEmbedder::new(EMBEDDING_DIM);
    let texts: Vec<String> = keep.iter().map(|c| c.text.clone()).collect();
    let keep_embeddings = embedder.embed_batch(&texts).unwrap();
    index.index(&keep, &keep_embeddings).await.unwrap();

    let query = embedder.embed_batch(&["wash tomatoes simmer".to_string()]).unwrap().remove(0);
    let hits = index.search(&query, 10).await.unwrap();
    assert!(hits.iter().all(|h| h.id.starts_with("salad:")));
}

#[tokio::test]
async fn mismatched_lengths_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let index = LanceVectorIndex::new(dir.path()).await.unwrap();
    let (chunks, mut embeddings) = sample_corpus();
    embeddings.pop();
    assert!(index.index(&chunks, &embeddings).await.is_err());
}
