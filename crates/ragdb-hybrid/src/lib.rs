//! Hybrid retrieval: keyword and vector searches fused by reciprocal
//! rank, optionally reranked, filtered, and truncated to the requested k.

pub mod engine;
pub mod rerank;
pub mod rrf;

pub use engine::HybridEngine;
