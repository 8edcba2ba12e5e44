//! LanceDB-backed vector index: schema, connection helpers and the
//! `VectorIndexer` implementation with lazy, single-flight initialization.

pub mod schema;
pub mod store;
pub mod table;

pub use store::{LanceVectorIndex, Lifecycle, VectorStoreConfig};
