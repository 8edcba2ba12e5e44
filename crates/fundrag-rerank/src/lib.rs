//! Second-stage reordering of fused results by an external relevance model.
//!
//! `RerankService` is the transport seam, `CohereReranker` speaks the
//! Cohere-compatible HTTP contract, and `Reranker` turns any service failure
//! into an explicit fallback to the fused order.

pub mod adapter;
pub mod http;
pub mod traits;

pub use adapter::{fallback, Reranker};
pub use http::CohereReranker;
pub use traits::{RerankRequest, RerankScore, RerankService};
