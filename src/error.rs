//! Error types for the `hermes-ingest` crate.

use thiserror::Error;

/// Errors that can occur while ingesting, storing, or deleting documents.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The file extension is not in the configured set of supported formats.
    #[error("unsupported file format: {extension}")]
    UnsupportedFormat {
        /// The offending file extension (without the leading dot).
        extension: String,
    },

    /// The file exceeds the configured maximum size.
    #[error("file too large: {size} bytes (limit {limit} bytes)")]
    FileTooLarge {
        /// Actual size of the file in bytes.
        size: u64,
        /// Configured maximum size in bytes.
        limit: u64,
    },

    /// Text or metadata extraction failed for a document.
    #[error("extraction failed for {source_name}: {message}")]
    Extraction {
        /// The file path or URL being extracted.
        source_name: String,
        /// A description of the failure.
        message: String,
    },

    /// The embedding backend returned an error.
    #[error("embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The vector store backend returned an error.
    #[error("vector store error ({backend}): {message}")]
    Store {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error. Fatal at startup, never per-request.
    #[error("configuration error: {0}")]
    Config(String),
}

/// A convenience result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;
