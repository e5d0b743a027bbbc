//! Shared application state

use std::sync::Arc;

use weeklog_config::Settings;
use weeklog_core::{IngestionDispatcher, TokenVerifier};
use weeklog_llm::LlmBackend;
use weeklog_qa::RagOrchestrator;
use weeklog_rag::UserCollections;

/// State handed to every handler. Everything is `Arc`'d so the state
/// clones cheaply per request.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub orchestrator: Arc<RagOrchestrator>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub dispatcher: Arc<dyn IngestionDispatcher>,
    pub llm: Arc<dyn LlmBackend>,
    pub collections: UserCollections,
}

impl AppState {
    pub fn new(
        settings: Arc<Settings>,
        orchestrator: Arc<RagOrchestrator>,
        verifier: Arc<dyn TokenVerifier>,
        dispatcher: Arc<dyn IngestionDispatcher>,
        llm: Arc<dyn LlmBackend>,
        collections: UserCollections,
    ) -> Self {
        Self {
            settings,
            orchestrator,
            verifier,
            dispatcher,
            llm,
            collections,
        }
    }
}
