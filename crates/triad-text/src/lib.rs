//! triad-text
//!
//! Sparse retrieval: an in-memory tantivy index scored with BM25 and the
//! keyword backend adapter serving it.
pub mod adapter;
pub mod index;
pub mod tantivy_utils;

pub use adapter::KeywordAdapter;
pub use index::LexicalIndex;
