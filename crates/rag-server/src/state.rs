//! Application state shared across all handlers.

use std::sync::Arc;
use std::time::Instant;

use rag_core::DriftConfig;
use rag_drift::DriftHarness;
use rag_engine::RetrievalEngine;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RetrievalEngine>,
    pub harness: Arc<DriftHarness>,
    pub start_time: Instant,
}

impl AppState {
    /// The drift harness issues its reads through the same engine.
    pub fn new(engine: Arc<RetrievalEngine>, drift: DriftConfig) -> Self {
        let harness = Arc::new(DriftHarness::new(engine.clone(), drift));
        Self {
            engine,
            harness,
            start_time: Instant::now(),
        }
    }
}
