//! Document ingestion for retrieval pipelines.
//!
//! `hermes-ingest` turns heterogeneous documents into overlapping text
//! chunks with provenance metadata, embeds them through an external model,
//! and persists the vectors in a filterable store so they can later be
//! searched, counted, and deleted by metadata predicates.
//!
//! # Components
//!
//! - [`chunking`] — recursive separator-priority splitting and chunk
//!   metadata derivation (`chunk_id`, `chunk_total`, `location`,
//!   `chunk_title`).
//! - [`extract`] — format extractors (plain text, markdown, HTML) selected
//!   by file extension.
//! - [`embedding`] / [`openai`] — the [`EmbeddingProvider`] trait and an
//!   OpenAI-compatible backend.
//! - [`store`] / [`qdrant`] / [`memory`] — the filter-aware
//!   [`DocumentStore`] contract with Qdrant and in-memory backends.
//! - [`pipeline`] — the [`Ingestor`] coordinator sequencing
//!   extract → chunk → embed → store with per-document failure isolation.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use hermes_ingest::{IngestConfig, Ingestor, QdrantDocumentStore};
//! use hermes_ingest::openai::OpenAiEmbeddings;
//!
//! let config = IngestConfig::builder().embedding_dimensions(1536).build()?;
//! let store = QdrantDocumentStore::new("http://localhost:6334", "documents", 1536)?;
//! let ingestor = Ingestor::builder()
//!     .config(config)
//!     .embedder(Arc::new(OpenAiEmbeddings::from_env()?))
//!     .store(Arc::new(store))
//!     .build()?;
//!
//! ingestor.init().await?;
//! let result = ingestor.ingest_file("notes.md".as_ref(), None).await;
//! println!("created {} chunks", result.chunks_created.unwrap_or(0));
//! ```

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod memory;
pub mod openai;
pub mod pipeline;
pub mod qdrant;
pub mod ratelimit;
pub mod store;

pub use chunking::{create_chunks, extract_chunk_title, split_text};
pub use config::{IngestConfig, IngestConfigBuilder};
pub use document::{Chunk, ChunkLocation, Document, EmbeddedChunk, Metadata, ScoredChunk};
pub use embedding::EmbeddingProvider;
pub use error::{IngestError, Result};
pub use extract::{DocumentFormat, Extractor};
pub use memory::InMemoryDocumentStore;
pub use pipeline::{
    BatchResult, DeleteOutcome, DeleteTarget, DocumentUpload, Ingestor, IngestorBuilder,
    ProcessingResult, StatusReport,
};
pub use qdrant::QdrantDocumentStore;
pub use ratelimit::RateLimiter;
pub use store::{DocumentStore, FilterValue, MetadataFilter, filename_filter};
