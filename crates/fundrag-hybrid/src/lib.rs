#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_imports)]

pub mod bootstrap;
pub mod fusion;
pub mod pipeline;
pub mod readiness;
pub mod search;
pub mod state;

pub use bootstrap::{BootstrapReport, IndexBootstrap};
pub use fusion::{rrf_fuse, validate_alpha, DEFAULT_RRF_K};
pub use pipeline::{HealthReport, HealthStatus, RetrievalPipeline, RetrievalRequest, RetrievalResponse, SearchMode};
pub use readiness::Readiness;
pub use search::HybridSearcher;
pub use state::{IndexState, IndexStateManager, RebuildDecision, StateRead};
