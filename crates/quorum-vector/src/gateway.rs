use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use quorum_core::{Chunk, CollectionInfo, Metadata, RetrievedChunk, SourceSummary};
use quorum_core::{CONVERSATION_KEY, SOURCE_KEY};

use crate::error::RetrievalError;

/// Optional scoping applied to a retrieval query.
///
/// `conversation_id` is an exact match on chunk metadata; `sources` matches
/// any of the listed names. Empty filters mean unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
}

impl SearchFilters {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn scoped(conversation_id: Option<&str>, sources: Option<&[String]>) -> Self {
        Self {
            conversation_id: conversation_id
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            sources: sources.map(<[String]>::to_vec).unwrap_or_default(),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.conversation_id.is_none() && self.sources.is_empty()
    }

    /// Evaluate the filters against a chunk's metadata.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        if let Some(ref conversation_id) = self.conversation_id {
            let tagged = metadata.get(CONVERSATION_KEY).and_then(|v| v.as_str());
            if tagged != Some(conversation_id.as_str()) {
                return false;
            }
        }
        if !self.sources.is_empty() {
            let source = metadata.get(SOURCE_KEY).and_then(|v| v.as_str());
            match source {
                Some(s) if self.sources.iter().any(|wanted| wanted == s) => {}
                _ => return false,
            }
        }
        true
    }
}

/// Store and query text chunks by semantic similarity.
#[async_trait]
pub trait RetrievalGateway: Send + Sync {
    /// Persist chunks, returning the identifiers assigned to them.
    async fn store(&self, chunks: Vec<Chunk>) -> Result<Vec<String>, RetrievalError>;

    /// The `limit` most similar chunks that pass `filters`, best first.
    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>, RetrievalError>;

    /// Collection status for health reporting.
    async fn describe(&self) -> Result<CollectionInfo, RetrievalError>;

    /// Sources stored under a conversation, with chunk counts, sorted by name.
    async fn list_sources(&self, conversation_id: &str)
        -> Result<Vec<SourceSummary>, RetrievalError>;

    /// Remove every chunk of `source` under `conversation_id`. Returns the count removed.
    async fn delete_source(
        &self,
        conversation_id: &str,
        source: &str,
    ) -> Result<usize, RetrievalError>;
}

/// Tally chunk metadata into per-source counts, sorted by name.
pub(crate) fn summarize_sources<'a, I>(metadata: I) -> Vec<SourceSummary>
where
    I: IntoIterator<Item = &'a Metadata>,
{
    let mut counts: std::collections::BTreeMap<String, usize> = Default::default();
    for meta in metadata {
        let name = meta
            .get(SOURCE_KEY)
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        *counts.entry(name.to_string()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(name, chunks)| SourceSummary { name, chunks })
        .collect()
}
