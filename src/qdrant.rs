//! Qdrant vector store backend.
//!
//! [`QdrantDocumentStore`] implements [`DocumentStore`] over the
//! [qdrant-client](https://docs.rs/qdrant-client) gRPC API. One record is
//! stored per chunk with a random uuid id and a payload of
//! `{ text, metadata }`; metadata filters translate to Qdrant conditions on
//! `metadata.*` payload paths.

use std::collections::BTreeSet;

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
    DeletePointsBuilder, Distance, FieldType, Filter, PointStruct, ScrollPointsBuilder,
    SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::document::{EmbeddedChunk, Metadata, ScoredChunk};
use crate::error::{IngestError, Result};
use crate::store::{DocumentStore, FilterValue, MetadataFilter};

/// Payload fields indexed for fast filtered count/delete/search. Missing
/// indexes affect performance only, so creation failures are logged and
/// ignored.
const INDEX_FIELDS: [(&str, FieldType); 6] = [
    ("filename", FieldType::Keyword),
    ("file_type", FieldType::Keyword),
    ("title", FieldType::Text),
    ("author", FieldType::Keyword),
    ("chunk_id", FieldType::Integer),
    ("location", FieldType::Keyword),
];

/// Upper bound on the payload scan behind [`document_names`](DocumentStore::document_names).
const SCROLL_LIMIT: u32 = 1000;

/// A [`DocumentStore`] backed by [Qdrant](https://qdrant.tech/).
///
/// Collections use cosine distance with the dimensionality fixed at
/// construction time.
pub struct QdrantDocumentStore {
    client: Qdrant,
    collection: String,
    dimensions: usize,
}

impl QdrantDocumentStore {
    /// Connect to a Qdrant instance at the given gRPC URL.
    pub fn new(url: &str, collection: impl Into<String>, dimensions: usize) -> Result<Self> {
        let client = Qdrant::from_url(url).build().map_err(Self::map_err)?;
        Ok(Self { client, collection: collection.into(), dimensions })
    }

    /// Wrap an existing client.
    pub fn from_client(client: Qdrant, collection: impl Into<String>, dimensions: usize) -> Self {
        Self { client, collection: collection.into(), dimensions }
    }

    fn map_err(e: qdrant_client::QdrantError) -> IngestError {
        IngestError::Store { backend: "qdrant".to_string(), message: e.to_string() }
    }

    fn check_dimensions(&self, chunks: &[EmbeddedChunk]) -> Result<()> {
        for chunk in chunks {
            if chunk.embedding.len() != self.dimensions {
                return Err(IngestError::Config(format!(
                    "embedding dimensionality {} does not match configured {}",
                    chunk.embedding.len(),
                    self.dimensions
                )));
            }
        }
        Ok(())
    }

    async fn create_payload_indexes(&self) {
        for (field, field_type) in INDEX_FIELDS {
            let result = self
                .client
                .create_field_index(CreateFieldIndexCollectionBuilder::new(
                    &self.collection,
                    format!("metadata.{field}"),
                    field_type,
                ))
                .await;
            if let Err(e) = result {
                warn!(collection = %self.collection, field, error = %e, "payload index creation failed");
            }
        }
    }
}

/// Translate a [`MetadataFilter`] into a Qdrant filter: single values become
/// `must` match conditions, lists become a nested `should` group per field.
///
/// Only string, boolean, and integer values translate to match conditions;
/// anything else is a configuration error rather than a silently-false
/// condition.
fn build_filter(filter: &MetadataFilter) -> Result<Filter> {
    let mut must: Vec<Condition> = Vec::new();
    for (key, value) in filter {
        let field = format!("metadata.{key}");
        match value {
            FilterValue::One(v) => must.push(match_condition(&field, v)?),
            FilterValue::Any(values) => {
                let should: Vec<Condition> =
                    values.iter().map(|v| match_condition(&field, v)).collect::<Result<_>>()?;
                must.push(Filter::should(should).into());
            }
        }
    }
    Ok(Filter::must(must))
}

fn match_condition(field: &str, value: &serde_json::Value) -> Result<Condition> {
    match value {
        serde_json::Value::String(s) => Ok(Condition::matches(field, s.clone())),
        serde_json::Value::Bool(b) => Ok(Condition::matches(field, *b)),
        serde_json::Value::Number(n) if n.as_i64().is_some() => {
            Ok(Condition::matches(field, n.as_i64().unwrap_or_default()))
        }
        other => Err(IngestError::Config(format!(
            "unsupported filter value for {field}: {other} (only strings, booleans, and integers \
             translate to match conditions)"
        ))),
    }
}

/// Convert a Qdrant payload value back into JSON.
fn value_to_json(value: QdrantValue) -> serde_json::Value {
    match value.kind {
        Some(Kind::StringValue(s)) => serde_json::Value::String(s),
        Some(Kind::IntegerValue(i)) => serde_json::Value::from(i),
        Some(Kind::DoubleValue(d)) => serde_json::Value::from(d),
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(Kind::StructValue(s)) => serde_json::Value::Object(
            s.fields.into_iter().map(|(k, v)| (k, value_to_json(v))).collect(),
        ),
        Some(Kind::ListValue(l)) => {
            serde_json::Value::Array(l.values.into_iter().map(value_to_json).collect())
        }
        Some(Kind::NullValue(_)) | None => serde_json::Value::Null,
    }
}

fn payload_metadata(value: Option<QdrantValue>) -> Metadata {
    match value.map(value_to_json) {
        Some(serde_json::Value::Object(map)) => map.into_iter().collect(),
        _ => Metadata::new(),
    }
}

fn point_id_string(id: Option<qdrant_client::qdrant::PointId>) -> String {
    match id.and_then(|pid| pid.point_id_options) {
        Some(PointIdOptions::Uuid(s)) => s,
        Some(PointIdOptions::Num(n)) => n.to_string(),
        None => String::new(),
    }
}

#[async_trait]
impl DocumentStore for QdrantDocumentStore {
    async fn ensure_collection(&self) -> Result<()> {
        let collections = self.client.list_collections().await.map_err(Self::map_err)?;
        if collections.collections.iter().any(|c| c.name == self.collection) {
            debug!(collection = %self.collection, "qdrant collection already exists");
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection).vectors_config(
                    VectorParamsBuilder::new(self.dimensions as u64, Distance::Cosine),
                ),
            )
            .await
            .map_err(Self::map_err)?;

        self.create_payload_indexes().await;

        info!(collection = %self.collection, dimensions = self.dimensions, "created qdrant collection");
        Ok(())
    }

    async fn upsert(&self, chunks: &[EmbeddedChunk]) -> Result<Vec<String>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        self.check_dimensions(chunks)?;

        let mut ids = Vec::with_capacity(chunks.len());
        let mut points = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let id = Uuid::new_v4().to_string();

            let mut payload_map = serde_json::Map::new();
            payload_map
                .insert("text".to_string(), serde_json::Value::String(chunk.chunk.text.clone()));
            payload_map.insert(
                "metadata".to_string(),
                serde_json::Value::Object(chunk.chunk.metadata.clone().into_iter().collect()),
            );
            let payload = Payload::try_from(serde_json::Value::Object(payload_map))
                .map_err(Self::map_err)?;

            points.push(PointStruct::new(id.clone(), chunk.embedding.clone(), payload));
            ids.push(id);
        }

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(Self::map_err)?;

        debug!(collection = %self.collection, count = chunks.len(), "upserted chunks");
        Ok(ids)
    }

    async fn count(&self, filter: Option<&MetadataFilter>) -> Result<u64> {
        let mut request = CountPointsBuilder::new(&self.collection).exact(true);
        if let Some(filter) = filter {
            request = request.filter(build_filter(filter)?);
        }
        let response = self.client.count(request).await.map_err(Self::map_err)?;
        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }

    async fn delete(&self, filter: &MetadataFilter) -> Result<String> {
        let response = self
            .client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(build_filter(filter)?)
                    .wait(true),
            )
            .await
            .map_err(Self::map_err)?;

        let operation_id =
            response.result.and_then(|r| r.operation_id).map(|id| id.to_string()).unwrap_or_default();
        debug!(collection = %self.collection, operation_id = %operation_id, "deleted points by filter");
        Ok(operation_id)
    }

    async fn search(
        &self,
        query: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>> {
        let mut request = SearchPointsBuilder::new(&self.collection, query.to_vec(), limit as u64)
            .with_payload(true);
        if let Some(filter) = filter {
            request = request.filter(build_filter(filter)?);
        }

        let response = self.client.search_points(request).await.map_err(Self::map_err)?;

        let results = response
            .result
            .into_iter()
            .map(|mut scored| {
                let text = match scored.payload.remove("text").map(value_to_json) {
                    Some(serde_json::Value::String(s)) => s,
                    _ => String::new(),
                };
                ScoredChunk {
                    id: point_id_string(scored.id),
                    score: scored.score,
                    text,
                    metadata: payload_metadata(scored.payload.remove("metadata")),
                }
            })
            .collect();

        Ok(results)
    }

    async fn document_names(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .scroll(
                ScrollPointsBuilder::new(&self.collection)
                    .limit(SCROLL_LIMIT)
                    .with_payload(true)
                    .with_vectors(false),
            )
            .await
            .map_err(Self::map_err)?;

        let mut names = BTreeSet::new();
        for mut point in response.result {
            let metadata = payload_metadata(point.payload.remove("metadata"));
            if let Some(serde_json::Value::String(name)) = metadata.get("filename") {
                names.insert(name.clone());
            }
        }
        Ok(names.into_iter().collect())
    }
}
