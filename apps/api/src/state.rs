use crate::generation::Pipeline;
use crate::session::SessionStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Providers plus validated settings. Built once at startup.
    pub pipeline: Pipeline,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            sessions: SessionStore::new(),
        }
    }
}
