//! Retrieval-augmented question answering.
//!
//! [`RagOrchestrator`] combines a [`RetrievalGateway`](quorum_vector::RetrievalGateway),
//! per-conversation [`ConversationMemory`], and a [`GenerationGateway`] into
//! a single `ask` operation that always resolves to an
//! [`AnswerResult`](quorum_core::AnswerResult).

pub mod error;
pub mod ingest;
pub mod llm;
pub mod memory;
pub mod orchestrator;
pub mod prompt;
pub mod retry;

pub use error::{GenerationError, IngestionError, RagError};
pub use ingest::{DocumentIngestor, FileIngestor, TextChunker};
pub use llm::{GeminiClient, GenerationGateway, PromptMessage, PromptRole, UnconfiguredGeneration};
pub use memory::ConversationMemory;
pub use orchestrator::{AskRequest, IngestReport, RagOrchestrator, RagSettings};
pub use retry::RetryPolicy;
