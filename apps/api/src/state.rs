use std::sync::Arc;

use crate::config::Config;
use crate::interviews::CompletionGuard;
use crate::llm_client::CompletionClient;
use crate::resumes::ResumeArchive;
use crate::storage::Storage;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub completion: Arc<dyn CompletionClient>,
    /// Raw resume uploads go here when S3 is configured.
    pub archive: Option<ResumeArchive>,
    /// Interviews whose completion is currently running in this process.
    pub completion_guard: CompletionGuard,
    pub config: Config,
}

impl AppState {
    pub fn new(
        storage: Arc<dyn Storage>,
        completion: Arc<dyn CompletionClient>,
        archive: Option<ResumeArchive>,
        config: Config,
    ) -> Self {
        Self {
            storage,
            completion,
            archive,
            completion_guard: CompletionGuard::default(),
            config,
        }
    }
}
