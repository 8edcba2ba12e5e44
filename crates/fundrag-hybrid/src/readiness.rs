use std::sync::atomic::{AtomicBool, Ordering};

/// Which indices can serve queries. Shared between bootstrap and the
/// retrieval pipeline; a failed build flips a flag instead of killing the
/// process.
#[derive(Debug, Default)]
pub struct Readiness {
    lexical: AtomicBool,
    vector: AtomicBool,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lexical_ready(&self) -> bool {
        self.lexical.load(Ordering::Acquire)
    }

    pub fn vector_ready(&self) -> bool {
        self.vector.load(Ordering::Acquire)
    }

    pub fn set_lexical(&self, ready: bool) {
        self.lexical.store(ready, Ordering::Release);
    }

    pub fn set_vector(&self, ready: bool) {
        self.vector.store(ready, Ordering::Release);
    }

    pub fn is_fully_ready(&self) -> bool {
        self.lexical_ready() && self.vector_ready()
    }
}
