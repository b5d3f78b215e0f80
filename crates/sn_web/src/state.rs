use sn_core::ArticleStorage;
use sn_pipeline::Orchestrator;
use std::sync::Arc;

pub struct AppState {
    pub storage: Arc<dyn ArticleStorage>,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            storage: orchestrator.storage(),
            orchestrator,
        }
    }
}
