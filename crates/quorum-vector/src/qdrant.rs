//! Qdrant-backed retrieval gateway over the REST API.
//!
//! Points carry `{text, metadata}` payloads; filters address
//! `metadata.conversation_id` and `metadata.source`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info};
use uuid::Uuid;

use quorum_core::{Chunk, CollectionInfo, Metadata, RetrievedChunk, SourceSummary};

use crate::embedding::DynEmbeddingService;
use crate::error::RetrievalError;
use crate::gateway::{summarize_sources, RetrievalGateway, SearchFilters};

const SCROLL_PAGE: usize = 100;

pub struct QdrantStore {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    embedder: Arc<dyn DynEmbeddingService>,
    ready: OnceCell<()>,
}

impl QdrantStore {
    pub fn new(
        base_url: impl Into<String>,
        collection: impl Into<String>,
        embedder: Arc<dyn DynEmbeddingService>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            embedder,
            ready: OnceCell::new(),
        }
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.base_url, self.collection, suffix)
    }

    /// Create the collection if it does not exist yet. Runs once per process.
    async fn ensure_collection(&self) -> Result<(), RetrievalError> {
        self.ready
            .get_or_try_init(|| async {
                let resp = self.client.get(self.url("")).send().await?;
                if resp.status().is_success() {
                    return Ok::<(), RetrievalError>(());
                }

                let body = json!({
                    "vectors": {
                        "size": self.embedder.dimensions(),
                        "distance": "Cosine"
                    }
                });
                let resp = self.client.put(self.url("")).json(&body).send().await?;
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                if status.is_success() || status.as_u16() == 409 || text.contains("already exists") {
                    info!(collection = %self.collection, "Qdrant collection ready");
                    Ok(())
                } else {
                    Err(RetrievalError::from_status(status, &text))
                }
            })
            .await
            .map(|_| ())
    }

    async fn post(&self, suffix: &str, body: &Value) -> Result<Value, RetrievalError> {
        let resp = self.client.post(self.url(suffix)).json(body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(RetrievalError::from_status(status, &text));
        }
        resp.json::<Value>()
            .await
            .map_err(|e| RetrievalError::Permanent(format!("Invalid Qdrant response: {}", e)))
    }
}

/// Translate filters into a Qdrant `filter` object, or `None` when unrestricted.
fn build_filter(filters: &SearchFilters) -> Option<Value> {
    if filters.is_unrestricted() {
        return None;
    }
    let mut must = Vec::new();
    if let Some(ref conversation_id) = filters.conversation_id {
        must.push(json!({
            "key": "metadata.conversation_id",
            "match": { "value": conversation_id }
        }));
    }
    if !filters.sources.is_empty() {
        must.push(json!({
            "key": "metadata.source",
            "match": { "any": filters.sources }
        }));
    }
    Some(json!({ "must": must }))
}

/// Rebuild a chunk from a point payload.
fn parse_point(point: &Value) -> Option<Chunk> {
    let payload = point.get("payload")?;
    let text = payload.get("text")?.as_str()?.to_string();
    let metadata: Metadata = payload
        .get("metadata")
        .and_then(|m| m.as_object())
        .cloned()
        .unwrap_or_default();
    Some(Chunk { text, metadata })
}

fn parse_collection_info(name: &str, body: &Value) -> CollectionInfo {
    let result = &body["result"];
    let points_count = result["points_count"].as_u64().unwrap_or(0);
    // newer Qdrant releases report null here
    let vectors_count = result["vectors_count"]
        .as_u64()
        .or_else(|| result["indexed_vectors_count"].as_u64())
        .unwrap_or(points_count);
    CollectionInfo::Ready {
        name: name.to_string(),
        vectors_count,
        points_count,
    }
}

#[async_trait]
impl RetrievalGateway for QdrantStore {
    async fn store(&self, chunks: Vec<Chunk>) -> Result<Vec<String>, RetrievalError> {
        self.ensure_collection().await?;

        let mut points = Vec::with_capacity(chunks.len());
        let mut ids = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let vector = self.embedder.embed_boxed(&chunk.text).await?;
            let id = Uuid::new_v4().to_string();
            points.push(json!({
                "id": id,
                "vector": vector,
                "payload": { "text": chunk.text, "metadata": chunk.metadata }
            }));
            ids.push(id);
        }

        let resp = self
            .client
            .put(self.url("/points?wait=true"))
            .json(&json!({ "points": points }))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(RetrievalError::from_status(status, &text));
        }
        debug!(count = ids.len(), collection = %self.collection, "Upserted points");
        Ok(ids)
    }

    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        self.ensure_collection().await?;
        let vector = self.embedder.embed_boxed(query).await?;

        let mut body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true
        });
        if let Some(filter) = build_filter(filters) {
            body["filter"] = filter;
        }

        let resp = self.post("/points/search", &body).await?;
        let hits = resp["result"]
            .as_array()
            .map(|points| points.iter().filter_map(parse_point).collect())
            .unwrap_or_default();
        Ok(hits)
    }

    async fn describe(&self) -> Result<CollectionInfo, RetrievalError> {
        let resp = self.client.get(self.url("")).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(RetrievalError::from_status(status, &text));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| RetrievalError::Permanent(format!("Invalid Qdrant response: {}", e)))?;
        Ok(parse_collection_info(&self.collection, &body))
    }

    async fn list_sources(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<SourceSummary>, RetrievalError> {
        self.ensure_collection().await?;
        let filter = build_filter(&SearchFilters::scoped(Some(conversation_id), None));

        let mut metadata = Vec::new();
        let mut offset = Value::Null;
        loop {
            let mut body = json!({
                "limit": SCROLL_PAGE,
                "with_payload": true,
                "with_vector": false
            });
            if let Some(ref f) = filter {
                body["filter"] = f.clone();
            }
            if !offset.is_null() {
                body["offset"] = offset.clone();
            }

            let resp = self.post("/points/scroll", &body).await?;
            if let Some(points) = resp["result"]["points"].as_array() {
                metadata.extend(points.iter().filter_map(parse_point).map(|c| c.metadata));
            }
            offset = resp["result"]["next_page_offset"].clone();
            if offset.is_null() {
                break;
            }
        }
        Ok(summarize_sources(metadata.iter()))
    }

    async fn delete_source(
        &self,
        conversation_id: &str,
        source: &str,
    ) -> Result<usize, RetrievalError> {
        self.ensure_collection().await?;
        let filters = SearchFilters {
            conversation_id: Some(conversation_id.to_string()),
            sources: vec![source.to_string()],
        };
        let filter = build_filter(&filters).unwrap_or_else(|| json!({}));

        let counted = self
            .post("/points/count", &json!({ "filter": filter, "exact": true }))
            .await?;
        let count = counted["result"]["count"].as_u64().unwrap_or(0) as usize;
        if count == 0 {
            return Ok(0);
        }

        self.post("/points/delete?wait=true", &json!({ "filter": filter }))
            .await?;
        info!(conversation_id, source, count, "Deleted source chunks");
        Ok(count)
    }
}
