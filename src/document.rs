//! Data types for documents, chunks, and search results.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key-value metadata carried by documents and chunks.
///
/// Values are [`serde_json::Value`] so heterogeneous extractor output
/// (strings, counts, timestamps) survives storage round-trips.
pub type Metadata = HashMap<String, Value>;

/// A source document: extracted text plus its metadata.
///
/// Produced by an [`Extractor`](crate::extract::Extractor); the metadata
/// always contains `source`, `filename`, and `file_type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// The extracted text content.
    pub text: String,
    /// Key-value metadata associated with the document.
    pub metadata: Metadata,
}

/// Approximate position of a chunk within its source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkLocation {
    /// The first chunk of a document. Wins over `End` for single-chunk documents.
    Beginning,
    /// Any chunk that is neither first nor last.
    Middle,
    /// The last chunk of a document.
    End,
}

impl ChunkLocation {
    /// The metadata string value for this location.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkLocation::Beginning => "beginning",
            ChunkLocation::Middle => "middle",
            ChunkLocation::End => "end",
        }
    }
}

impl fmt::Display for ChunkLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A segment of a [`Document`] with derived metadata.
///
/// The metadata is a copy of the owning document's metadata plus
/// `chunk_id`, `chunk_total`, `location`, and (when derivable) `chunk_title`.
/// Chunks are immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// The non-empty text content of the chunk.
    pub text: String,
    /// Document metadata plus chunk-derived fields.
    pub metadata: Metadata,
}

/// A [`Chunk`] paired with its vector embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddedChunk {
    /// The chunk being embedded.
    pub chunk: Chunk,
    /// A dense vector of the configured dimensionality.
    pub embedding: Vec<f32>,
}

/// A stored chunk retrieved by similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// The opaque id assigned at store time.
    pub id: String,
    /// Cosine similarity score in `[-1, 1]`; higher is more relevant.
    pub score: f32,
    /// The stored chunk text.
    pub text: String,
    /// The stored chunk metadata.
    pub metadata: Metadata,
}
