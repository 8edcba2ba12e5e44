//! fundrag-text
//!
//! In-memory BM25 keyword index on Tantivy. The whole corpus is re-indexed on
//! every startup; a rebuild swaps in a fresh snapshot so readers never see a
//! half-built index.

pub mod tantivy_utils;
pub mod index;

pub use index::LexicalIndex;
