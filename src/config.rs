//! Configuration for the ingestion pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};

/// Default maximum file size: 50 MiB.
const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Configuration parameters for the ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestConfig {
    /// Target chunk size in characters. A best-effort limit: a single
    /// atomic unit longer than this is emitted as an oversized chunk.
    pub chunk_size: usize,
    /// Number of trailing characters carried into the next chunk.
    /// Must be strictly less than `chunk_size`.
    pub chunk_overlap: usize,
    /// Number of chunk texts sent to the embedding backend per call.
    pub embedding_batch_size: usize,
    /// Dimensionality of the embedding vectors. Must match the model output.
    pub embedding_dimensions: usize,
    /// Maximum accepted file size in bytes.
    pub max_file_size: u64,
    /// File extensions (without the leading dot) accepted for ingestion.
    pub supported_formats: Vec<String>,
    /// Name of the vector store collection.
    pub collection_name: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            embedding_batch_size: 32,
            embedding_dimensions: 384,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            supported_formats: ["txt", "text", "md", "markdown", "html", "htm"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            collection_name: "documents".to_string(),
        }
    }
}

impl IngestConfig {
    /// Create a new builder for constructing an [`IngestConfig`].
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder::default()
    }

    /// Whether the given file extension (without dot, case-insensitive)
    /// is accepted for ingestion.
    pub fn supports(&self, extension: &str) -> bool {
        let extension = extension.to_ascii_lowercase();
        self.supported_formats.iter().any(|f| *f == extension)
    }
}

/// Builder for constructing a validated [`IngestConfig`].
#[derive(Debug, Clone, Default)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    /// Set the target chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the embedding batch size.
    pub fn embedding_batch_size(mut self, size: usize) -> Self {
        self.config.embedding_batch_size = size;
        self
    }

    /// Set the embedding dimensionality.
    pub fn embedding_dimensions(mut self, dimensions: usize) -> Self {
        self.config.embedding_dimensions = dimensions;
        self
    }

    /// Set the maximum accepted file size in bytes.
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    /// Replace the set of supported file extensions.
    pub fn supported_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.supported_formats = formats.into_iter().map(Into::into).collect();
        self
    }

    /// Set the vector store collection name.
    pub fn collection_name(mut self, name: impl Into<String>) -> Self {
        self.config.collection_name = name.into();
        self
    }

    /// Build the [`IngestConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Config`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `embedding_batch_size == 0`
    /// - `embedding_dimensions == 0`
    pub fn build(self) -> Result<IngestConfig> {
        if self.config.chunk_size == 0 {
            return Err(IngestError::Config("chunk_size must be greater than zero".to_string()));
        }
        if self.config.chunk_overlap >= self.config.chunk_size {
            return Err(IngestError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.config.chunk_overlap, self.config.chunk_size
            )));
        }
        if self.config.embedding_batch_size == 0 {
            return Err(IngestError::Config(
                "embedding_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.config.embedding_dimensions == 0 {
            return Err(IngestError::Config(
                "embedding_dimensions must be greater than zero".to_string(),
            ));
        }
        Ok(self.config)
    }
}
