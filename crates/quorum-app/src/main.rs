//! Quorum application binary - composition root.
//!
//! 1. Load configuration from TOML, then apply env and CLI overrides
//! 2. Evaluate which collaborators are configured
//! 3. Build the retrieval, generation and call-control backends
//! 4. Start the axum REST API server

mod cli;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use quorum_api::state::AppState;
use quorum_call::{AcsCallControl, CallControl, CallRegistry, CallSettings, UnconfiguredCallControl};
use quorum_core::config::RetrievalBackend;
use quorum_core::{Capabilities, QuorumConfig};
use quorum_rag::{
    ConversationMemory, FileIngestor, GeminiClient, GenerationGateway, RagOrchestrator,
    RagSettings, TextChunker, UnconfiguredGeneration,
};
use quorum_vector::{DynEmbeddingService, GeminiEmbedding, InMemoryStore, MockEmbedding, QdrantStore, RetrievalGateway};

use cli::CliArgs;

fn build_generation(config: &QuorumConfig, caps: &Capabilities) -> Arc<dyn GenerationGateway> {
    if !caps.generation.available {
        tracing::warn!(reason = %caps.generation.reason_or_default(), "Generation disabled");
        return Arc::new(UnconfiguredGeneration::new(caps.generation.reason_or_default()));
    }
    let gen = &config.generation;
    match GeminiClient::new(
        &gen.base_url,
        &gen.api_key,
        &gen.model,
        gen.temperature,
        gen.max_output_tokens,
        Duration::from_secs(gen.request_timeout_secs),
    ) {
        Ok(client) => {
            tracing::info!(model = %gen.model, "Gemini generation ready");
            Arc::new(client)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to build Gemini client");
            Arc::new(UnconfiguredGeneration::new(e.to_string()))
        }
    }
}

fn build_embedder(config: &QuorumConfig) -> Arc<dyn DynEmbeddingService> {
    let retrieval = &config.retrieval;
    if !config.generation.api_key.trim().is_empty() {
        match GeminiEmbedding::new(
            &config.generation.base_url,
            &config.generation.api_key,
            &retrieval.embedding_model,
            retrieval.embedding_dim,
        ) {
            Ok(embedder) => return Arc::new(embedder),
            Err(e) => tracing::warn!(error = %e, "Gemini embeddings unavailable"),
        }
    }
    tracing::info!("Using mock embeddings");
    Arc::new(MockEmbedding::with_dimensions(retrieval.embedding_dim))
}

fn build_retrieval(config: &QuorumConfig, caps: &Capabilities) -> Arc<dyn RetrievalGateway> {
    let retrieval = &config.retrieval;
    let embedder = build_embedder(config);
    match retrieval.backend {
        RetrievalBackend::Qdrant if caps.retrieval.available => {
            tracing::info!(url = %retrieval.qdrant_url, collection = %retrieval.collection, "Using Qdrant");
            Arc::new(QdrantStore::new(
                &retrieval.qdrant_url,
                &retrieval.collection,
                embedder,
            ))
        }
        RetrievalBackend::Qdrant => {
            tracing::warn!(
                reason = %caps.retrieval.reason_or_default(),
                "Qdrant not usable, falling back to in-memory store"
            );
            Arc::new(InMemoryStore::new(&retrieval.collection, embedder))
        }
        RetrievalBackend::Memory => {
            tracing::info!(collection = %retrieval.collection, "Using in-memory vector store");
            Arc::new(InMemoryStore::new(&retrieval.collection, embedder))
        }
    }
}

fn build_call_control(config: &QuorumConfig, caps: &Capabilities) -> Arc<dyn CallControl> {
    if !caps.call_control.available {
        tracing::info!(reason = %caps.call_control.reason_or_default(), "Call control disabled");
        return Arc::new(UnconfiguredCallControl::new(caps.call_control.reason_or_default()));
    }
    match AcsCallControl::new(&config.call.acs_endpoint, &config.call.acs_access_token) {
        Ok(acs) => {
            tracing::info!(endpoint = %config.call.acs_endpoint, "ACS call control ready");
            Arc::new(acs)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to build ACS client");
            Arc::new(UnconfiguredCallControl::new(e.to_string()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = QuorumConfig::load_or_default(&config_file);
    config.apply_env_overrides();
    config.server.port = args.resolve_port(config.server.port);
    if let Some(dir) = args.resolve_upload_dir() {
        config.general.upload_dir = dir;
    }

    // Tracing.
    let level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .init();

    tracing::info!("Starting Quorum v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    let caps = Capabilities::evaluate(&config);

    if let Err(e) = std::fs::create_dir_all(&config.general.upload_dir) {
        tracing::error!(path = %config.general.upload_dir, error = %e, "Failed to create upload directory");
        return Err(e.into());
    }

    let ingestion = &config.ingestion;
    let orchestrator = Arc::new(RagOrchestrator::new(
        build_retrieval(&config, &caps),
        build_generation(&config, &caps),
        Arc::new(FileIngestor::new(TextChunker::new(
            ingestion.chunk_size,
            ingestion.chunk_overlap,
        ))),
        ConversationMemory::new(config.rag.history_turns)
            .with_max_conversations(config.rag.max_conversations),
        RagSettings::from_config(&config),
    ));

    let calls = Arc::new(CallRegistry::new(
        build_call_control(&config, &caps),
        orchestrator.clone(),
        CallSettings::from_config(&config),
    ));

    let state = AppState::new(config.clone(), orchestrator, calls);

    quorum_api::start_server(&config, state).await?;

    Ok(())
}
