//! Vector store contract: filter-aware upsert, count, delete, and search.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{EmbeddedChunk, ScoredChunk};
use crate::error::Result;

/// A metadata filter: field name → value constraint, AND'd across fields.
///
/// Field names are resolved against the `metadata` sub-object of the stored
/// payload, never the `text` field.
pub type MetadataFilter = HashMap<String, FilterValue>;

/// The constraint applied to a single filter field.
///
/// Serializes untagged, so filters round-trip as plain JSON objects:
/// `{"filename": "a.txt", "location": ["beginning", "end"]}`.
///
/// Values should be strings, booleans, or integers. The in-memory store
/// compares any JSON value structurally, but the Qdrant backend translates
/// filters to match conditions and rejects other value types with a
/// configuration error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FilterValue {
    /// The field must equal any of these values (OR within the field).
    Any(Vec<Value>),
    /// The field must equal this value.
    One(Value),
}

impl FilterValue {
    /// Whether a stored metadata value satisfies this constraint.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FilterValue::One(expected) => expected == value,
            FilterValue::Any(candidates) => candidates.iter().any(|c| c == value),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::One(Value::from(value))
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::One(Value::from(value))
    }
}

impl From<Vec<Value>> for FilterValue {
    fn from(values: Vec<Value>) -> Self {
        FilterValue::Any(values)
    }
}

/// Build the filter matching all chunks of one stored document.
pub fn filename_filter(filename: &str) -> MetadataFilter {
    let mut filter = MetadataFilter::new();
    filter.insert("filename".to_string(), FilterValue::from(filename));
    filter
}

/// A persistent, filterable store of embedded chunks.
///
/// Records are write-once: ids are generated at store time and never derived
/// from content, so re-ingesting identical text produces new records. All
/// operations must be safe for concurrent use from multiple pipelines.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Make sure the backing collection exists with the configured
    /// dimensionality. Idempotent.
    async fn ensure_collection(&self) -> Result<()>;

    /// Write all chunks, returning the generated record ids in order.
    ///
    /// The batch succeeds or fails as a whole; a failed batch contributes
    /// zero records. Supplying embeddings whose length differs from the
    /// configured dimensionality is a configuration error.
    async fn upsert(&self, chunks: &[EmbeddedChunk]) -> Result<Vec<String>>;

    /// Count stored records matching the filter; `None` counts everything.
    async fn count(&self, filter: Option<&MetadataFilter>) -> Result<u64>;

    /// Delete all records matching the filter, returning an opaque token for
    /// the completed operation. The token is not a deletion count; callers
    /// needing a count must call [`count`](DocumentStore::count) first.
    async fn delete(&self, filter: &MetadataFilter) -> Result<String>;

    /// Return up to `limit` records most similar to `query`, ordered by
    /// descending cosine similarity.
    async fn search(
        &self,
        query: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>>;

    /// Best-effort scan of distinct `filename` metadata values, bounded by
    /// the backend's scroll limit.
    async fn document_names(&self) -> Result<Vec<String>>;
}
