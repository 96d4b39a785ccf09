//! Question answering over the hybrid index: intent routing, the bounded
//! recursive retrieval loop, and intent-templated generation with
//! citations.

pub mod assess;
pub mod controller;
pub mod expand;
pub mod generator;
pub mod llm;
pub mod pipeline;
pub mod router;
pub mod testing;

pub use generator::Answer;
pub use pipeline::{RagPipeline, RagResponse};
