//! Dense-vector retrieval backed by LanceDB.
//!
//! Rebuilds write into a fresh versioned table and flip the active-table
//! pointer in a small key/value meta table, so searches never observe a
//! half-built index.

pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use writer::LanceVectorIndex;
