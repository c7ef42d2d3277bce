//! In-memory document store using cosine similarity.
//!
//! [`InMemoryDocumentStore`] implements the full [`DocumentStore`] contract,
//! including metadata filters, without a running Qdrant instance. Intended
//! for development and tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::document::{EmbeddedChunk, Metadata, ScoredChunk};
use crate::error::{IngestError, Result};
use crate::store::{DocumentStore, MetadataFilter};

struct StoredRecord {
    vector: Vec<f32>,
    text: String,
    metadata: Metadata,
}

/// An in-memory [`DocumentStore`] keyed by generated uuid ids.
pub struct InMemoryDocumentStore {
    records: RwLock<HashMap<String, StoredRecord>>,
    dimensions: usize,
    operations: AtomicU64,
}

impl InMemoryDocumentStore {
    /// Create an empty store for vectors of the given dimensionality.
    pub fn new(dimensions: usize) -> Self {
        Self { records: RwLock::new(HashMap::new()), dimensions, operations: AtomicU64::new(0) }
    }
}

fn matches_filter(metadata: &Metadata, filter: &MetadataFilter) -> bool {
    filter.iter().all(|(key, constraint)| {
        metadata.get(key).is_some_and(|value| constraint.matches(value))
    })
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn ensure_collection(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, chunks: &[EmbeddedChunk]) -> Result<Vec<String>> {
        for chunk in chunks {
            if chunk.embedding.len() != self.dimensions {
                return Err(IngestError::Config(format!(
                    "embedding dimensionality {} does not match configured {}",
                    chunk.embedding.len(),
                    self.dimensions
                )));
            }
        }

        let mut records = self.records.write().await;
        let mut ids = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let id = Uuid::new_v4().to_string();
            records.insert(
                id.clone(),
                StoredRecord {
                    vector: chunk.embedding.clone(),
                    text: chunk.chunk.text.clone(),
                    metadata: chunk.chunk.metadata.clone(),
                },
            );
            ids.push(id);
        }
        Ok(ids)
    }

    async fn count(&self, filter: Option<&MetadataFilter>) -> Result<u64> {
        let records = self.records.read().await;
        let count = match filter {
            None => records.len(),
            Some(filter) => {
                records.values().filter(|r| matches_filter(&r.metadata, filter)).count()
            }
        };
        Ok(count as u64)
    }

    async fn delete(&self, filter: &MetadataFilter) -> Result<String> {
        let mut records = self.records.write().await;
        records.retain(|_, record| !matches_filter(&record.metadata, filter));
        let operation = self.operations.fetch_add(1, Ordering::Relaxed);
        Ok(operation.to_string())
    }

    async fn search(
        &self,
        query: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>> {
        let records = self.records.read().await;
        let mut scored: Vec<ScoredChunk> = records
            .iter()
            .filter(|(_, record)| {
                filter.is_none_or(|filter| matches_filter(&record.metadata, filter))
            })
            .map(|(id, record)| ScoredChunk {
                id: id.clone(),
                score: cosine_similarity(&record.vector, query),
                text: record.text.clone(),
                metadata: record.metadata.clone(),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn document_names(&self) -> Result<Vec<String>> {
        let records = self.records.read().await;
        let names: BTreeSet<String> = records
            .values()
            .filter_map(|r| r.metadata.get("filename").and_then(|v| v.as_str()))
            .map(|s| s.to_string())
            .collect();
        Ok(names.into_iter().collect())
    }
}
