//! RAG orchestrator: retrieval, prompt assembly, generation with retry and
//! fallback, and conversation memory.
//!
//! `ask` never fails. Every failure path resolves to an [`AnswerResult`]
//! whose apology text is the error signal.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use quorum_core::config::QuorumConfig;
use quorum_core::{AnswerResult, Chunk, CollectionInfo, SourceSummary};
use quorum_vector::{RetrievalError, RetrievalGateway, SearchFilters};

use crate::error::{GenerationError, IngestionError, RagError};
use crate::ingest::DocumentIngestor;
use crate::llm::GenerationGateway;
use crate::memory::ConversationMemory;
use crate::prompt;
use crate::retry::RetryPolicy;

/// Reply when generation keeps coming back blank.
pub const GENERATION_APOLOGY: &str =
    "I'm having trouble generating a response right now. Please try again.";
/// Reply when the primary path failed and the bare fallback did too.
pub const SERVICE_APOLOGY: &str =
    "I'm having trouble connecting to the AI service. Please try again in a moment.";
/// Reply to a blank question.
pub const EMPTY_QUESTION_REPLY: &str = "Please enter a question so I can help.";

/// Tunables for [`RagOrchestrator`].
#[derive(Debug, Clone)]
pub struct RagSettings {
    /// Chunks retrieved per question.
    pub top_k: usize,
    /// Generation retry policy, shared by the primary and fallback paths.
    pub retry: RetryPolicy,
    /// Retry policy for each store batch.
    pub store_retry: RetryPolicy,
    pub batch_size: usize,
    /// Pause between store batches.
    pub batch_pause: Duration,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            retry: RetryPolicy::default(),
            store_retry: RetryPolicy::default(),
            batch_size: 5,
            batch_pause: Duration::from_secs(1),
        }
    }
}

impl RagSettings {
    pub fn from_config(config: &QuorumConfig) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            retry: RetryPolicy::with_unit(config.rag.max_attempts, config.rag.retry_delay_ms),
            store_retry: RetryPolicy::with_unit(
                config.ingestion.store_attempts,
                config.rag.retry_delay_ms,
            ),
            batch_size: config.ingestion.batch_size,
            batch_pause: Duration::from_millis(config.ingestion.batch_pause_ms),
        }
    }
}

/// A question plus its optional scoping.
#[derive(Debug, Clone, Default)]
pub struct AskRequest {
    pub question: String,
    /// Restricts retrieval to chunks uploaded into this conversation.
    pub conversation_id: Option<String>,
    /// Restricts retrieval to these source names.
    pub selected_sources: Option<Vec<String>>,
    /// History bucket. Defaults to `conversation_id`.
    pub history_key: Option<String>,
}

impl AskRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Self::default()
        }
    }

    pub fn in_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.selected_sources = Some(sources);
        self
    }

    pub fn with_history_key(mut self, key: impl Into<String>) -> Self {
        self.history_key = Some(key.into());
        self
    }

    fn history(&self) -> Option<&str> {
        self.history_key
            .as_deref()
            .or(self.conversation_id.as_deref())
    }
}

/// Outcome of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub source: String,
    pub chunks: usize,
    pub ids: Vec<String>,
}

/// Why the primary answer path gave up.
#[derive(Debug, thiserror::Error)]
enum PrimaryFailure {
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),
}

pub struct RagOrchestrator {
    retrieval: Arc<dyn RetrievalGateway>,
    generation: Arc<dyn GenerationGateway>,
    ingestor: Arc<dyn DocumentIngestor>,
    memory: ConversationMemory,
    settings: RagSettings,
}

impl RagOrchestrator {
    pub fn new(
        retrieval: Arc<dyn RetrievalGateway>,
        generation: Arc<dyn GenerationGateway>,
        ingestor: Arc<dyn DocumentIngestor>,
        memory: ConversationMemory,
        settings: RagSettings,
    ) -> Self {
        Self {
            retrieval,
            generation,
            ingestor,
            memory,
            settings,
        }
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn settings(&self) -> &RagSettings {
        &self.settings
    }

    /// Answer a question. Never fails.
    pub async fn ask(&self, request: &AskRequest) -> AnswerResult {
        let question = request.question.trim();
        if question.is_empty() {
            return AnswerResult::general(EMPTY_QUESTION_REPLY);
        }

        match self.answer_with_context(request, question).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Answer path failed, falling back to a bare question");
                self.fallback(question).await
            }
        }
    }

    async fn answer_with_context(
        &self,
        request: &AskRequest,
        question: &str,
    ) -> Result<AnswerResult, PrimaryFailure> {
        let filters = SearchFilters::scoped(
            request.conversation_id.as_deref(),
            request.selected_sources.as_deref(),
        );
        let chunks = self
            .retrieval
            .search(question, &filters, self.settings.top_k)
            .await?;
        debug!(chunks = chunks.len(), scoped = !filters.is_unrestricted(), "Retrieved context");

        let history_key = request.history();
        let history = self.memory.history(history_key);
        let messages = prompt::build_prompt(&chunks, &history, question);

        let answer = match self
            .settings
            .retry
            .generate(self.generation.as_ref(), &messages)
            .await?
        {
            Some(text) => Some(text),
            None => {
                warn!("Every templated attempt was blank, trying the bare question");
                let direct = self
                    .generation
                    .complete(&prompt::direct_prompt(question))
                    .await?;
                (!direct.trim().is_empty()).then_some(direct)
            }
        };

        match answer {
            Some(answer) => {
                self.memory.record_exchange(history_key, question, &answer);
                Ok(AnswerResult::from_retrieval(answer, &chunks))
            }
            None => Ok(AnswerResult::from_retrieval(GENERATION_APOLOGY, &chunks)),
        }
    }

    /// Bare question, no context or history. Never writes memory.
    async fn fallback(&self, question: &str) -> AnswerResult {
        match self
            .settings
            .retry
            .generate(self.generation.as_ref(), &prompt::direct_prompt(question))
            .await
        {
            Ok(Some(answer)) => AnswerResult::general(answer),
            Ok(None) => AnswerResult::general(SERVICE_APOLOGY),
            Err(e) => {
                error!(error = %e, "Fallback generation exhausted");
                AnswerResult::general(SERVICE_APOLOGY)
            }
        }
    }

    /// Chunk a file and store it, tagged with `conversation_id` when given.
    pub async fn add_documents(
        &self,
        path: &Path,
        conversation_id: Option<&str>,
    ) -> Result<IngestReport, RagError> {
        let ingestor = Arc::clone(&self.ingestor);
        let owned = path.to_path_buf();
        let chunks = tokio::task::spawn_blocking(move || ingestor.load_file(&owned))
            .await
            .map_err(|e| IngestionError::Read(format!("ingestion task failed: {}", e)))??;
        self.store_chunks(chunks, conversation_id).await
    }

    /// Chunk raw text under `source` and store it.
    pub async fn add_text(
        &self,
        text: &str,
        source: &str,
        conversation_id: Option<&str>,
    ) -> Result<IngestReport, RagError> {
        let chunks = self.ingestor.load_text(text, source)?;
        self.store_chunks(chunks, conversation_id).await
    }

    async fn store_chunks(
        &self,
        chunks: Vec<Chunk>,
        conversation_id: Option<&str>,
    ) -> Result<IngestReport, RagError> {
        if chunks.is_empty() {
            return Err(IngestionError::EmptyInput.into());
        }
        let source = chunks[0].source().unwrap_or("unknown").to_string();
        let chunks: Vec<Chunk> = match conversation_id.filter(|c| !c.is_empty()) {
            Some(c) => chunks.into_iter().map(|chunk| chunk.with_conversation(c)).collect(),
            None => chunks,
        };

        let batches: Vec<&[Chunk]> = chunks.chunks(self.settings.batch_size.max(1)).collect();
        let mut ids = Vec::with_capacity(chunks.len());
        for (i, batch) in batches.iter().enumerate() {
            let stored = self
                .settings
                .store_retry
                .run(
                    "store_batch",
                    || self.retrieval.store(batch.to_vec()),
                    |e: &RetrievalError| e.is_transient(),
                )
                .await?;
            ids.extend(stored);
            debug!(batch = i + 1, of = batches.len(), "Stored batch");
            if i + 1 < batches.len() {
                tokio::time::sleep(self.settings.batch_pause).await;
            }
        }

        info!(source = %source, chunks = chunks.len(), conversation_id = ?conversation_id, "Ingested document");
        Ok(IngestReport {
            source,
            chunks: chunks.len(),
            ids,
        })
    }

    /// Reset history for one conversation, or all when `None`. Idempotent.
    pub fn clear_memory(&self, conversation_id: Option<&str>) {
        self.memory.clear(conversation_id);
    }

    /// Collection status. Failures come back as [`CollectionInfo::Unavailable`].
    pub async fn collection_info(&self) -> CollectionInfo {
        match self.retrieval.describe().await {
            Ok(info) => info,
            Err(e) => CollectionInfo::Unavailable {
                error: e.to_string(),
            },
        }
    }

    pub async fn list_sources(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<SourceSummary>, RetrievalError> {
        self.retrieval.list_sources(conversation_id).await
    }

    pub async fn delete_source(
        &self,
        conversation_id: &str,
        source: &str,
    ) -> Result<usize, RetrievalError> {
        self.retrieval.delete_source(conversation_id, source).await
    }
}
