use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use quorum_core::{Chunk, CollectionInfo, RetrievedChunk, SourceSummary};

use crate::embedding::{DynEmbeddingService, MockEmbedding};
use crate::error::RetrievalError;
use crate::gateway::{summarize_sources, RetrievalGateway, SearchFilters};
use crate::index::VectorIndex;

/// Process-local retrieval gateway over [`VectorIndex`]. Contents are lost on restart.
pub struct InMemoryStore {
    name: String,
    index: VectorIndex,
    embedder: Arc<dyn DynEmbeddingService>,
}

impl InMemoryStore {
    pub fn new(name: impl Into<String>, embedder: Arc<dyn DynEmbeddingService>) -> Self {
        Self {
            name: name.into(),
            index: VectorIndex::new(),
            embedder,
        }
    }

    /// A store backed by deterministic hash embeddings.
    pub fn with_mock_embeddings(name: impl Into<String>) -> Self {
        Self::new(name, Arc::new(MockEmbedding::new()))
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[async_trait]
impl RetrievalGateway for InMemoryStore {
    async fn store(&self, chunks: Vec<Chunk>) -> Result<Vec<String>, RetrievalError> {
        let mut ids = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let embedding = self.embedder.embed_boxed(&chunk.text).await?;
            let id = Uuid::new_v4();
            self.index.insert(id, embedding, chunk)?;
            ids.push(id.to_string());
        }
        debug!(count = ids.len(), collection = %self.name, "Stored chunks in memory");
        Ok(ids)
    }

    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        let embedding = self.embedder.embed_boxed(query).await?;
        let hits = self.index.search(&embedding, limit, |m| filters.matches(m))?;
        Ok(hits.into_iter().map(|h| h.chunk).collect())
    }

    async fn describe(&self) -> Result<CollectionInfo, RetrievalError> {
        let count = self.index.len() as u64;
        Ok(CollectionInfo::Ready {
            name: self.name.clone(),
            vectors_count: count,
            points_count: count,
        })
    }

    async fn list_sources(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<SourceSummary>, RetrievalError> {
        let filters = SearchFilters::scoped(Some(conversation_id), None);
        let metadata = self.index.metadata_where(|m| filters.matches(m))?;
        Ok(summarize_sources(metadata.iter()))
    }

    async fn delete_source(
        &self,
        conversation_id: &str,
        source: &str,
    ) -> Result<usize, RetrievalError> {
        let filters = SearchFilters {
            conversation_id: Some(conversation_id.to_string()),
            sources: vec![source.to_string()],
        };
        self.index.remove_where(|m| filters.matches(m))
    }
}
