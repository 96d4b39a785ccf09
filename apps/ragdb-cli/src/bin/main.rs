use std::env;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use ragdb_core::chunker::Chunker;
use ragdb_core::config::{expand_path, RagConfig};
use ragdb_core::store::ChunkStore;
use ragdb_core::traits::Retriever;
use ragdb_core::types::SourceDocument;
use ragdb_embed::get_default_embedder;
use ragdb_hybrid::rerank::LexicalOverlapReranker;
use ragdb_hybrid::HybridEngine;
use ragdb_rag::generator::{extract_citations, StreamedAnswer};
use ragdb_rag::llm::MoonshotClient;
use ragdb_rag::RagPipeline;
use ragdb_text::TantivyIndexer;
use ragdb_vector::LanceVectorIndex;

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    if args.is_empty() {
        eprintln!("Usage: {prog} <ingest|ask|stats> [args...]");
        eprintln!("  ingest [data_dir]   chunk documents and build both indexes");
        eprintln!("  ask [question]      answer one question, or start an interactive session");
        eprintln!("  stats               show corpus statistics");
        std::process::exit(1);
    }
    let cmd = args.remove(0);
    (cmd, args)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();
    let config = RagConfig::load()?;
    let (cmd, args) = parse_args();
    match cmd.as_str() {
        "ingest" => {
            let data_dir = args
                .first()
                .map(PathBuf::from)
                .unwrap_or_else(|| expand_path(&config.paths.data_dir));
            ingest(&config, &data_dir).await?;
        }
        "ask" => {
            let question = args.first().cloned();
            ask(&config, question).await?;
        }
        "stats" => stats(&config)?,
        _ => {
            eprintln!("Unknown command: {cmd}");
            std::process::exit(1);
        }
    }
    Ok(())
}

fn collect_documents(data_dir: &Path) -> anyhow::Result<Vec<SourceDocument>> {
    let mut docs = Vec::new();
    for entry in walkdir::WalkDir::new(data_dir).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let is_text = path
            .extension()
            .is_some_and(|ext| ext == "txt" || ext == "md");
        if !is_text {
            continue;
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let source = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        docs.push(SourceDocument { source, text });
    }
    Ok(docs)
}

async fn build_engine(
    config: &RagConfig,
    store: Arc<ChunkStore>,
    fresh: bool,
) -> anyhow::Result<Arc<HybridEngine>> {
    let tantivy_dir = expand_path(&config.paths.tantivy_dir);
    let keyword = if fresh {
        Arc::new(TantivyIndexer::create(tantivy_dir)?)
    } else {
        Arc::new(TantivyIndexer::open(&tantivy_dir)?)
    };
    let vector = Arc::new(LanceVectorIndex::new(&expand_path(&config.paths.lancedb_dir)).await?);
    let embedder: Arc<dyn ragdb_core::traits::Embedder> = Arc::from(get_default_embedder()?);
    Ok(Arc::new(HybridEngine::new(
        store,
        keyword,
        vector,
        embedder,
        Some(Box::new(LexicalOverlapReranker)),
        config.retrieval.clone(),
        config.fusion.clone(),
        config.rerank.clone(),
    )))
}

async fn ingest(config: &RagConfig, data_dir: &Path) -> anyhow::Result<()> {
    println!("📚 Ingesting from {}", data_dir.display());
    let docs = collect_documents(data_dir)?;
    if docs.is_empty() {
        println!("No .txt or .md documents found in {}", data_dir.display());
    }

    let chunker = Chunker::new(config.chunking.clone());
    let pb = ProgressBar::new(docs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} documents {msg}")?
            .progress_chars("#>-"),
    );
    let mut store = ChunkStore::new();
    for doc in &docs {
        store.insert_chunks(chunker.chunk_document(doc));
        pb.inc(1);
    }
    pb.finish_with_message("chunked");

    let store_path = expand_path(&config.paths.store_path);
    store.save(&store_path)?;
    let store = Arc::new(store);

    let engine = build_engine(config, Arc::clone(&store), true).await?;
    let indexed = engine.build_indexes().await?;
    println!(
        "✅ Ingest complete: {} documents, {} chunks ({} indexed)",
        docs.len(),
        store.len(),
        indexed
    );
    Ok(())
}

fn load_store(config: &RagConfig) -> anyhow::Result<Arc<ChunkStore>> {
    let store_path = expand_path(&config.paths.store_path);
    if !store_path.exists() {
        anyhow::bail!("No chunk store at {}; run `ragdb ingest` first", store_path.display());
    }
    Ok(Arc::new(ChunkStore::load(&store_path)?))
}

async fn ask(config: &RagConfig, question: Option<String>) -> anyhow::Result<()> {
    let store = load_store(config)?;
    let engine = build_engine(config, Arc::clone(&store), false).await?;
    let model = Arc::new(MoonshotClient::new(&config.llm)?);
    let pipeline = RagPipeline::new(
        config,
        Arc::clone(&store),
        Arc::clone(&engine) as Arc<dyn Retriever>,
        model,
    );

    if let Some(question) = question {
        answer_one(&pipeline, &store, &question).await?;
        return Ok(());
    }

    println!("💬 Ask about your documents (quit/exit/退出 to leave)");
    let stdin = std::io::stdin();
    loop {
        print!("\n> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "quit" | "exit" | "退出") {
            println!("👋 Bye");
            break;
        }
        answer_one(&pipeline, &store, question).await?;
    }
    Ok(())
}

async fn answer_one(
    pipeline: &RagPipeline,
    store: &ChunkStore,
    question: &str,
) -> anyhow::Result<()> {
    let (intent, _evidence, streamed) = pipeline.ask_streamed(question).await?;
    println!("🧭 Intent: {}", intent.as_str());
    match streamed {
        StreamedAnswer::Streaming { mut fragments, context_ids } => {
            let mut text = String::new();
            while let Some(fragment) = fragments.recv().await {
                print!("{fragment}");
                std::io::stdout().flush()?;
                text.push_str(&fragment);
            }
            println!();
            let citations = extract_citations(&text, &context_ids);
            if !citations.is_empty() {
                let mut sources: Vec<String> = citations
                    .iter()
                    .filter_map(|id| store.get(id))
                    .map(|c| c.source.clone())
                    .collect();
                sources.dedup();
                println!("📎 Sources: {}", sources.join(", "));
            }
        }
        StreamedAnswer::InsufficientEvidence => {
            println!("🤷 No supporting passages found in the corpus for this question.");
        }
        StreamedAnswer::Unavailable { evidence } => {
            println!("⚠️  The model is unavailable. Closest passages found:");
            for id in evidence {
                if let Some(chunk) = store.get(&id) {
                    println!("  [{}] {}", id, chunk.text);
                }
            }
        }
    }
    Ok(())
}

fn stats(config: &RagConfig) -> anyhow::Result<()> {
    let store = load_store(config)?;
    let children = store.retrieval_chunks().len();
    println!("📊 Corpus statistics");
    println!("  chunks: {} ({} indexed, {} parents)", store.len(), children, store.len() - children);
    let sources = store.sources();
    println!("  sources: {}", sources.len());
    for source in sources {
        println!("    - {source}");
    }
    Ok(())
}
