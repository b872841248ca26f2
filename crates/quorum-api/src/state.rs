//! Application state shared across all route handlers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use quorum_call::CallRegistry;
use quorum_core::{Capabilities, QuorumConfig};
use quorum_rag::RagOrchestrator;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<QuorumConfig>,
    pub orchestrator: Arc<RagOrchestrator>,
    pub calls: Arc<CallRegistry>,
    /// Evaluated once at startup.
    pub capabilities: Arc<Capabilities>,
    /// Where uploaded files are written before ingestion.
    pub upload_dir: PathBuf,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: QuorumConfig,
        orchestrator: Arc<RagOrchestrator>,
        calls: Arc<CallRegistry>,
    ) -> Self {
        let capabilities = Capabilities::evaluate(&config);
        let upload_dir = PathBuf::from(&config.general.upload_dir);
        Self {
            config: Arc::new(config),
            orchestrator,
            calls,
            capabilities: Arc::new(capabilities),
            upload_dir,
            start_time: Instant::now(),
        }
    }

    pub fn with_upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = dir.into();
        self
    }
}
