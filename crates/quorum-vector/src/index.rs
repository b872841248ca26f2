//! In-memory vector index with brute-force cosine similarity search.
//!
//! All operations are O(n), which is acceptable for development datasets.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use uuid::Uuid;

use quorum_core::{Chunk, Metadata};

use crate::error::RetrievalError;

/// A single hit returned from a vector search.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: Uuid,
    /// Cosine similarity score.
    pub score: f64,
    pub chunk: Chunk,
}

#[derive(Debug, Clone)]
struct VectorEntry {
    embedding: Vec<f32>,
    chunk: Chunk,
}

/// Thread-safe in-memory vector index.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Arc<RwLock<HashMap<Uuid, VectorEntry>>>,
}

fn poisoned<E: std::fmt::Display>(e: E) -> RetrievalError {
    RetrievalError::Permanent(format!("Lock poisoned: {}", e))
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a chunk with its embedding. Overwrites any entry with the same ID.
    pub fn insert(&self, id: Uuid, embedding: Vec<f32>, chunk: Chunk) -> Result<(), RetrievalError> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.insert(id, VectorEntry { embedding, chunk });
        Ok(())
    }

    /// The k nearest entries whose metadata passes `accept`, by descending score.
    pub fn search<F>(&self, query: &[f32], k: usize, accept: F) -> Result<Vec<SearchHit>, RetrievalError>
    where
        F: Fn(&Metadata) -> bool,
    {
        let entries = self.entries.read().map_err(poisoned)?;

        let mut scored: Vec<SearchHit> = entries
            .iter()
            .filter(|(_, entry)| accept(&entry.chunk.metadata))
            .map(|(id, entry)| SearchHit {
                id: *id,
                score: cosine_similarity(query, &entry.embedding),
                chunk: entry.chunk.clone(),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    /// Metadata of every entry passing `accept`.
    pub fn metadata_where<F>(&self, accept: F) -> Result<Vec<Metadata>, RetrievalError>
    where
        F: Fn(&Metadata) -> bool,
    {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries
            .values()
            .filter(|e| accept(&e.chunk.metadata))
            .map(|e| e.chunk.metadata.clone())
            .collect())
    }

    /// Remove every entry passing `accept`. Returns how many were removed.
    pub fn remove_where<F>(&self, accept: F) -> Result<usize, RetrievalError>
    where
        F: Fn(&Metadata) -> bool,
    {
        let mut entries = self.entries.write().map_err(poisoned)?;
        let before = entries.len();
        entries.retain(|_, e| !accept(&e.chunk.metadata));
        Ok(before - entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cosine similarity between two vectors. 0.0 on length mismatch or zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();

    let mag_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}
