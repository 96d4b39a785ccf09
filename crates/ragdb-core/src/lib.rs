//! ragdb-core
//!
//! Domain types, configuration, error kinds, and the trait seams shared by
//! the index, retrieval, and generation crates. Also home to the Chunker
//! and the persistent chunk metadata store.

pub mod chunker;
pub mod config;
pub mod error;
pub mod store;
pub mod traits;
pub mod types;
