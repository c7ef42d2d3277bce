//! Ingestion coordinator.
//!
//! The [`Ingestor`] sequences extract → chunk → embed → store for one
//! document at a time, batches documents with per-document failure
//! isolation, and owns deletion and temporary-file lifecycle. It composes
//! an [`EmbeddingProvider`] and a [`DocumentStore`] built via
//! [`Ingestor::builder()`].
//!
//! # Example
//!
//! ```rust,ignore
//! use hermes_ingest::{Ingestor, IngestConfig, InMemoryDocumentStore};
//!
//! let ingestor = Ingestor::builder()
//!     .config(IngestConfig::default())
//!     .embedder(Arc::new(my_embedder))
//!     .store(Arc::new(InMemoryDocumentStore::new(384)))
//!     .build()?;
//!
//! ingestor.init().await?;
//! let result = ingestor.ingest_file(Path::new("notes.md"), None).await;
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::chunking::create_chunks;
use crate::config::IngestConfig;
use crate::document::{Chunk, EmbeddedChunk, Metadata};
use crate::embedding::EmbeddingProvider;
use crate::error::{IngestError, Result};
use crate::extract::{self, Extractor};
use crate::store::{DocumentStore, MetadataFilter, filename_filter};

/// Outcome of processing one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResult {
    /// Whether the document was fully ingested.
    pub success: bool,
    /// Name of the processed file.
    pub file_name: String,
    /// Number of chunks created, when processing succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks_created: Option<usize>,
    /// Ids assigned to the stored chunks, when processing succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_ids: Option<Vec<String>>,
    /// Wall-clock processing time in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<f64>,
    /// Error message, when processing failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessingResult {
    fn success(file_name: String, chunk_ids: Vec<String>, chunks: usize, started: Instant) -> Self {
        Self {
            success: true,
            file_name,
            chunks_created: Some(chunks),
            chunk_ids: Some(chunk_ids),
            processing_time: Some(started.elapsed().as_secs_f64()),
            error: None,
        }
    }

    fn failure(file_name: String, error: &IngestError) -> Self {
        Self {
            success: false,
            file_name,
            chunks_created: None,
            chunk_ids: None,
            processing_time: None,
            error: Some(error.to_string()),
        }
    }
}

/// Aggregated outcome of a batch of documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    /// Number of documents submitted.
    pub total: usize,
    /// Number of documents fully ingested.
    pub successful: usize,
    /// Number of documents that failed.
    pub failed: usize,
    /// Per-document results, in submission order.
    pub results: Vec<ProcessingResult>,
}

impl BatchResult {
    fn from_results(results: Vec<ProcessingResult>) -> Self {
        let successful = results.iter().filter(|r| r.success).count();
        Self { total: results.len(), successful, failed: results.len() - successful, results }
    }
}

/// Outcome of a [`delete_document`](Ingestor::delete_document) call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteOutcome {
    /// Whether matching records were found and the delete was issued.
    pub success: bool,
    /// Number of records matching the filter before deletion. Approximate:
    /// concurrent writes between the count and the delete can make this
    /// diverge from the number actually removed.
    pub deleted_count: u64,
    /// Opaque token for the completed delete operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    /// Error message, when no records matched or the store failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeleteOutcome {
    fn failure(message: String) -> Self {
        Self { success: false, deleted_count: 0, operation_id: None, error: Some(message) }
    }
}

/// Counts of what the store currently holds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StatusReport {
    /// Distinct source documents (by filename), bounded by the store's scan
    /// limit.
    pub document_count: usize,
    /// Total stored chunks.
    pub chunk_count: u64,
}

/// An in-memory document upload: raw bytes plus the original file name.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    /// Original file name; its extension selects the format.
    pub file_name: String,
    /// Raw file content.
    pub bytes: Vec<u8>,
}

/// Identifies the records to remove: a filename or an explicit filter.
#[derive(Debug, Clone)]
pub enum DeleteTarget {
    /// Delete every chunk whose `filename` metadata equals this value.
    Filename(String),
    /// Delete every chunk matching this metadata filter.
    Filter(MetadataFilter),
}

impl From<&str> for DeleteTarget {
    fn from(filename: &str) -> Self {
        DeleteTarget::Filename(filename.to_string())
    }
}

impl From<String> for DeleteTarget {
    fn from(filename: String) -> Self {
        DeleteTarget::Filename(filename)
    }
}

impl From<MetadataFilter> for DeleteTarget {
    fn from(filter: MetadataFilter) -> Self {
        DeleteTarget::Filter(filter)
    }
}

/// The document ingestion coordinator.
///
/// Cloning is cheap: the embedding provider and store are shared behind
/// `Arc`s, so clones can run independent pipelines concurrently.
#[derive(Clone)]
pub struct Ingestor {
    config: IngestConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn DocumentStore>,
}

impl std::fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingestor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Ingestor {
    /// Create a new [`IngestorBuilder`].
    pub fn builder() -> IngestorBuilder {
        IngestorBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Return a reference to the document store.
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Make sure the backing collection exists. Call once at startup.
    pub async fn init(&self) -> Result<()> {
        self.store.ensure_collection().await
    }

    /// Ingest a document file from disk.
    ///
    /// `extra_metadata` is merged over the extracted metadata; caller keys
    /// win on conflict. Never returns an error: failures are reported in the
    /// result.
    pub async fn ingest_file(
        &self,
        path: &Path,
        extra_metadata: Option<&Metadata>,
    ) -> ProcessingResult {
        let started = Instant::now();
        let file_name = extract::file_name(path);
        match self.process_path(path, None, extra_metadata).await {
            Ok((chunk_ids, chunks)) => {
                info!(file = %file_name, chunks, "ingested document");
                ProcessingResult::success(file_name, chunk_ids, chunks, started)
            }
            Err(e) => {
                error!(file = %file_name, error = %e, "ingestion failed");
                ProcessingResult::failure(file_name, &e)
            }
        }
    }

    /// Ingest an uploaded document from raw bytes.
    ///
    /// The content is spooled to a temporary file carrying the original
    /// extension; the file is removed on every exit path. Format and size
    /// checks run before any extraction work.
    pub async fn ingest_bytes(
        &self,
        bytes: &[u8],
        file_name: &str,
        extra_metadata: Option<&Metadata>,
    ) -> ProcessingResult {
        let started = Instant::now();

        if let Err(e) = self.precheck(file_name, bytes.len() as u64) {
            error!(file = %file_name, error = %e, "upload rejected");
            return ProcessingResult::failure(file_name.to_string(), &e);
        }

        let extension = extract::file_extension(Path::new(file_name));
        let spooled = tempfile::Builder::new()
            .suffix(&format!(".{extension}"))
            .tempfile()
            .and_then(|mut tmp| tmp.write_all(bytes).map(|_| tmp));
        let tmp = match spooled {
            Ok(tmp) => tmp,
            Err(e) => {
                let e = IngestError::Extraction {
                    source_name: file_name.to_string(),
                    message: format!("failed to spool upload: {e}"),
                };
                error!(file = %file_name, error = %e, "upload rejected");
                return ProcessingResult::failure(file_name.to_string(), &e);
            }
        };

        // The temp file is deleted when `tmp` drops, on all paths.
        match self.process_path(tmp.path(), Some(file_name), extra_metadata).await {
            Ok((chunk_ids, chunks)) => {
                info!(file = %file_name, chunks, "ingested uploaded document");
                ProcessingResult::success(file_name.to_string(), chunk_ids, chunks, started)
            }
            Err(e) => {
                error!(file = %file_name, error = %e, "ingestion failed");
                ProcessingResult::failure(file_name.to_string(), &e)
            }
        }
    }

    /// Ingest a batch of uploads. Documents are processed independently:
    /// one failure never aborts the rest.
    pub async fn ingest_batch(
        &self,
        uploads: &[DocumentUpload],
        extra_metadata: Option<&Metadata>,
    ) -> BatchResult {
        let mut results = Vec::with_capacity(uploads.len());
        for upload in uploads {
            results.push(
                self.ingest_bytes(&upload.bytes, &upload.file_name, extra_metadata).await,
            );
        }
        BatchResult::from_results(results)
    }

    /// Ingest a list of files from disk, independently per file.
    pub async fn ingest_paths(
        &self,
        paths: &[PathBuf],
        extra_metadata: Option<&Metadata>,
    ) -> BatchResult {
        let mut results = Vec::with_capacity(paths.len());
        for path in paths {
            results.push(self.ingest_file(path, extra_metadata).await);
        }
        BatchResult::from_results(results)
    }

    /// Ingest every supported file in a directory.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Extraction`] if `dir` is not a readable
    /// directory. Per-file failures are reported in the batch result.
    pub async fn ingest_dir(
        &self,
        dir: &Path,
        recursive: bool,
        extra_metadata: Option<&Metadata>,
    ) -> Result<BatchResult> {
        if !dir.is_dir() {
            return Err(IngestError::Extraction {
                source_name: dir.display().to_string(),
                message: "not a directory".to_string(),
            });
        }

        let mut paths = Vec::new();
        self.collect_files(dir, recursive, &mut paths)?;
        paths.sort();
        Ok(self.ingest_paths(&paths, extra_metadata).await)
    }

    /// Fetch a document over HTTP and ingest it.
    ///
    /// The file name is derived from the last path segment of the URL and its
    /// extension is checked before any download happens. The body is streamed
    /// to a temporary file and rejected as soon as it exceeds
    /// `max_file_size`, so an oversized target is never buffered in memory.
    pub async fn ingest_url(
        &self,
        url: &str,
        extra_metadata: Option<&Metadata>,
    ) -> ProcessingResult {
        let started = Instant::now();
        let (file_name, tmp) = match self.fetch(url).await {
            Ok(fetched) => fetched,
            Err(e) => {
                error!(url, error = %e, "url fetch failed");
                return ProcessingResult::failure(url.to_string(), &e);
            }
        };

        // The temp file is deleted when `tmp` drops, on all paths.
        match self.process_path(tmp.path(), Some(&file_name), extra_metadata).await {
            Ok((chunk_ids, chunks)) => {
                info!(url, chunks, "ingested document from url");
                ProcessingResult::success(file_name, chunk_ids, chunks, started)
            }
            Err(e) => {
                error!(url, error = %e, "ingestion failed");
                ProcessingResult::failure(file_name, &e)
            }
        }
    }

    /// Fire-and-forget URL ingestion.
    ///
    /// Returns immediately; the fetch/process/cleanup sequence runs on a
    /// spawned task and failures are logged, never surfaced to the caller.
    pub fn ingest_url_background(&self, url: String, extra_metadata: Option<Metadata>) {
        let ingestor = self.clone();
        tokio::spawn(async move {
            let result = ingestor.ingest_url(&url, extra_metadata.as_ref()).await;
            if result.success {
                info!(url, chunks = ?result.chunks_created, "background ingestion finished");
            } else {
                error!(url, error = ?result.error, "background ingestion failed");
            }
        });
    }

    /// Delete a document's chunks by filename or explicit metadata filter.
    ///
    /// Counts the matching records first; when nothing matches, the result
    /// is a failure and the underlying delete is never issued. The reported
    /// `deleted_count` is the pre-delete count, which can diverge from the
    /// number actually removed if records are inserted or removed
    /// concurrently.
    pub async fn delete_document(&self, target: impl Into<DeleteTarget>) -> DeleteOutcome {
        let filter = match target.into() {
            DeleteTarget::Filename(name) => filename_filter(&name),
            DeleteTarget::Filter(filter) => filter,
        };

        let before = match self.store.count(Some(&filter)).await {
            Ok(count) => count,
            Err(e) => {
                error!(error = %e, "delete count failed");
                return DeleteOutcome::failure(e.to_string());
            }
        };
        if before == 0 {
            return DeleteOutcome::failure("no documents match the given identifier".to_string());
        }

        match self.store.delete(&filter).await {
            Ok(operation_id) => {
                info!(deleted = before, operation_id = %operation_id, "deleted document chunks");
                DeleteOutcome {
                    success: true,
                    deleted_count: before,
                    operation_id: Some(operation_id),
                    error: None,
                }
            }
            Err(e) => {
                error!(error = %e, "delete failed");
                DeleteOutcome::failure(e.to_string())
            }
        }
    }

    /// Report total chunk count and distinct document count.
    pub async fn status(&self) -> Result<StatusReport> {
        let chunk_count = self.store.count(None).await?;
        let document_count = self.store.document_names().await?.len();
        Ok(StatusReport { document_count, chunk_count })
    }

    /// Reject unsupported extensions and oversized content before any
    /// extraction work happens.
    fn precheck(&self, file_name: &str, size: u64) -> Result<()> {
        let extension = extract::file_extension(Path::new(file_name));
        if !self.config.supports(&extension) {
            return Err(IngestError::UnsupportedFormat { extension });
        }
        if size > self.config.max_file_size {
            return Err(IngestError::FileTooLarge { size, limit: self.config.max_file_size });
        }
        Ok(())
    }

    /// Run the full pipeline for one file: extract → chunk → embed → store.
    ///
    /// `display_name`, when set, replaces the on-disk name in the metadata
    /// (used for uploads spooled to temporary files).
    async fn process_path(
        &self,
        path: &Path,
        display_name: Option<&str>,
        extra_metadata: Option<&Metadata>,
    ) -> Result<(Vec<String>, usize)> {
        let size = fs::metadata(path)
            .map(|m| m.len())
            .map_err(|e| IngestError::Extraction {
                source_name: path.display().to_string(),
                message: e.to_string(),
            })?;
        let on_disk_name = extract::file_name(path);
        self.precheck(display_name.unwrap_or(&on_disk_name), size)?;

        let extractor = Extractor::for_path(path)?;
        let document = extractor.extract()?;

        let mut metadata = document.metadata;
        if let Some(name) = display_name {
            metadata.insert("filename".to_string(), Value::from(name));
            metadata.insert("source".to_string(), Value::from(name));
        }
        if let Some(extra) = extra_metadata {
            for (key, value) in extra {
                metadata.insert(key.clone(), value.clone());
            }
        }
        metadata.insert("ingested_at".to_string(), Value::from(Utc::now().to_rfc3339()));

        let chunks = create_chunks(
            &document.text,
            &metadata,
            self.config.chunk_size,
            self.config.chunk_overlap,
        );
        if chunks.is_empty() {
            // Empty extracted text is a no-op success, not an error.
            info!(path = %path.display(), "document produced no chunks");
            return Ok((Vec::new(), 0));
        }
        let total = chunks.len();

        let embedded = self.embed_chunks(chunks).await?;
        let chunk_ids = self.store.upsert(&embedded).await?;

        Ok((chunk_ids, total))
    }

    /// Embed chunk texts in fixed-size batches, preserving order.
    async fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<EmbeddedChunk>> {
        let mut embeddings = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.config.embedding_batch_size) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            embeddings.extend(self.embedder.embed_batch(&texts).await?);
        }

        if embeddings.len() != chunks.len() {
            return Err(IngestError::Embedding {
                provider: "pipeline".to_string(),
                message: format!(
                    "backend returned {} vectors for {} inputs",
                    embeddings.len(),
                    chunks.len()
                ),
            });
        }

        Ok(chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| EmbeddedChunk { chunk, embedding })
            .collect())
    }

    fn collect_files(&self, dir: &Path, recursive: bool, paths: &mut Vec<PathBuf>) -> Result<()> {
        let entries = fs::read_dir(dir).map_err(|e| IngestError::Extraction {
            source_name: dir.display().to_string(),
            message: e.to_string(),
        })?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                if recursive {
                    self.collect_files(&path, recursive, paths)?;
                }
            } else if self.config.supports(&extract::file_extension(&path)) {
                paths.push(path);
            }
        }
        Ok(())
    }

    /// Download a URL to a temporary file carrying the derived extension.
    ///
    /// Streams the body to disk, failing with [`IngestError::FileTooLarge`]
    /// as soon as the written size passes `max_file_size`.
    async fn fetch(&self, url: &str) -> Result<(String, tempfile::NamedTempFile)> {
        let fetch_err = |message: String| IngestError::Extraction {
            source_name: url.to_string(),
            message,
        };

        let file_name = url
            .split(['?', '#'])
            .next()
            .and_then(|base| base.rsplit('/').find(|segment| !segment.is_empty()))
            .map(|segment| segment.to_string())
            .ok_or_else(|| fetch_err("cannot derive a file name from the url".to_string()))?;
        self.precheck(&file_name, 0)?;

        let mut response = reqwest::get(url)
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| fetch_err(e.to_string()))?;

        let extension = extract::file_extension(Path::new(&file_name));
        let mut tmp = tempfile::Builder::new()
            .suffix(&format!(".{extension}"))
            .tempfile()
            .map_err(|e| fetch_err(format!("failed to spool download: {e}")))?;

        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await.map_err(|e| fetch_err(e.to_string()))? {
            written += chunk.len() as u64;
            if written > self.config.max_file_size {
                return Err(IngestError::FileTooLarge {
                    size: written,
                    limit: self.config.max_file_size,
                });
            }
            tmp.write_all(&chunk)
                .map_err(|e| fetch_err(format!("failed to spool download: {e}")))?;
        }

        Ok((file_name, tmp))
    }
}

/// Builder for constructing an [`Ingestor`].
///
/// `config` defaults to [`IngestConfig::default()`]; the embedding provider
/// and store are required.
#[derive(Default)]
pub struct IngestorBuilder {
    config: Option<IngestConfig>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    store: Option<Arc<dyn DocumentStore>>,
}

impl IngestorBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: IngestConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the document store.
    pub fn store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Build the [`Ingestor`], validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Config`] if a required component is missing or
    /// the provider's dimensionality does not match `embedding_dimensions`.
    pub fn build(self) -> Result<Ingestor> {
        let config = self.config.unwrap_or_default();
        let embedder = self
            .embedder
            .ok_or_else(|| IngestError::Config("embedder is required".to_string()))?;
        let store =
            self.store.ok_or_else(|| IngestError::Config("store is required".to_string()))?;

        if embedder.dimensions() != config.embedding_dimensions {
            return Err(IngestError::Config(format!(
                "embedding provider produces {}-dimensional vectors but {} are configured",
                embedder.dimensions(),
                config.embedding_dimensions
            )));
        }

        Ok(Ingestor { config, embedder, store })
    }
}
