//! End-to-end coordinator behavior with a deterministic embedder and the
//! in-memory store.

use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use async_trait::async_trait;
use hermes_ingest::document::{EmbeddedChunk, Metadata, ScoredChunk};
use hermes_ingest::embedding::EmbeddingProvider;
use hermes_ingest::error::{IngestError, Result};
use hermes_ingest::memory::InMemoryDocumentStore;
use hermes_ingest::pipeline::{DocumentUpload, Ingestor};
use hermes_ingest::store::{DocumentStore, FilterValue, MetadataFilter, filename_filter};
use hermes_ingest::IngestConfig;
use serde_json::Value;
use tempfile::TempDir;

const DIM: usize = 8;

/// Deterministic embedder: hashes the text into a fixed-length vector.
struct HashEmbedder;

fn hash_vector(text: &str) -> Vec<f32> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    let seed = hasher.finish();
    (0..DIM).map(|i| (seed.rotate_left(i as u32 * 8) as u32 as f32) / u32::MAX as f32).collect()
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(hash_vector(text))
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// Wraps a store and counts delete invocations.
struct CountingStore {
    inner: InMemoryDocumentStore,
    deletes: AtomicUsize,
}

#[async_trait]
impl DocumentStore for CountingStore {
    async fn ensure_collection(&self) -> Result<()> {
        self.inner.ensure_collection().await
    }

    async fn upsert(&self, chunks: &[EmbeddedChunk]) -> Result<Vec<String>> {
        self.inner.upsert(chunks).await
    }

    async fn count(&self, filter: Option<&MetadataFilter>) -> Result<u64> {
        self.inner.count(filter).await
    }

    async fn delete(&self, filter: &MetadataFilter) -> Result<String> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(filter).await
    }

    async fn search(
        &self,
        query: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>> {
        self.inner.search(query, limit, filter).await
    }

    async fn document_names(&self) -> Result<Vec<String>> {
        self.inner.document_names().await
    }
}

fn ingestor_with(store: Arc<dyn DocumentStore>, config: IngestConfig) -> Ingestor {
    Ingestor::builder().config(config).embedder(Arc::new(HashEmbedder)).store(store).build().unwrap()
}

fn default_ingestor(store: Arc<dyn DocumentStore>) -> Ingestor {
    let config = IngestConfig::builder().embedding_dimensions(DIM).build().unwrap();
    ingestor_with(store, config)
}

fn fixture(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn long_text() -> String {
    (0..400).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ")
}

/// Serve one HTTP request with the given body, returning the bound address.
fn serve_http(body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut request = [0u8; 1024];
            let _ = stream.read(&mut request);
            let header = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: text/plain\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(header.as_bytes());
            for chunk in body.chunks(8192) {
                if stream.write_all(chunk).is_err() {
                    break;
                }
            }
        }
    });
    addr.to_string()
}

#[tokio::test]
async fn ingest_file_stores_all_chunks() {
    let dir = TempDir::new().unwrap();
    let path = fixture(&dir, "doc.txt", &long_text());
    let store = Arc::new(InMemoryDocumentStore::new(DIM));
    let ingestor = default_ingestor(store.clone());
    ingestor.init().await.unwrap();

    let result = ingestor.ingest_file(&path, None).await;
    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.file_name, "doc.txt");
    assert!(result.processing_time.is_some());

    let chunks = result.chunks_created.unwrap();
    assert!(chunks >= 1);
    assert_eq!(result.chunk_ids.unwrap().len(), chunks);
    assert_eq!(store.count(None).await.unwrap(), chunks as u64);
    assert_eq!(store.count(Some(&filename_filter("doc.txt"))).await.unwrap(), chunks as u64);
}

#[tokio::test]
async fn stored_metadata_carries_provenance() {
    let dir = TempDir::new().unwrap();
    let path = fixture(&dir, "doc.txt", "A single small document.");
    let store = Arc::new(InMemoryDocumentStore::new(DIM));
    let ingestor = default_ingestor(store.clone());

    let mut extra = Metadata::new();
    extra.insert("author".to_string(), Value::from("Jane Doe"));
    let result = ingestor.ingest_file(&path, Some(&extra)).await;
    assert!(result.success);

    let results = store.search(&hash_vector("A single small document."), 1, None).await.unwrap();
    let metadata = &results[0].metadata;
    assert_eq!(metadata["filename"], Value::from("doc.txt"));
    assert_eq!(metadata["file_type"], Value::from("text"));
    assert_eq!(metadata["author"], Value::from("Jane Doe"));
    assert_eq!(metadata["chunk_id"], Value::from(0u64));
    assert_eq!(metadata["location"], Value::from("beginning"));
    assert!(metadata.contains_key("ingested_at"));
}

#[tokio::test]
async fn caller_metadata_wins_over_extracted() {
    let dir = TempDir::new().unwrap();
    let path = fixture(&dir, "doc.txt", "Some content here.");
    let store = Arc::new(InMemoryDocumentStore::new(DIM));
    let ingestor = default_ingestor(store.clone());

    let mut extra = Metadata::new();
    extra.insert("file_type".to_string(), Value::from("override"));
    ingestor.ingest_file(&path, Some(&extra)).await;

    let mut filter = MetadataFilter::new();
    filter.insert("file_type".to_string(), FilterValue::from("override"));
    assert_eq!(store.count(Some(&filter)).await.unwrap(), 1);
}

#[tokio::test]
async fn empty_document_is_a_no_op_success() {
    let dir = TempDir::new().unwrap();
    let path = fixture(&dir, "empty.txt", "");
    let store = Arc::new(InMemoryDocumentStore::new(DIM));
    let ingestor = default_ingestor(store.clone());

    let result = ingestor.ingest_file(&path, None).await;
    assert!(result.success);
    assert_eq!(result.chunks_created, Some(0));
    assert_eq!(store.count(None).await.unwrap(), 0);
}

#[tokio::test]
async fn oversized_upload_is_rejected_before_extraction() {
    let store = Arc::new(InMemoryDocumentStore::new(DIM));
    let config = IngestConfig::builder()
        .embedding_dimensions(DIM)
        .max_file_size(16)
        .build()
        .unwrap();
    let ingestor = ingestor_with(store.clone(), config);

    let result = ingestor.ingest_bytes(&[b'x'; 64], "big.txt", None).await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("file too large"));
    assert_eq!(store.count(None).await.unwrap(), 0);
}

#[tokio::test]
async fn batch_isolates_per_document_failures() {
    let store = Arc::new(InMemoryDocumentStore::new(DIM));
    let ingestor = default_ingestor(store.clone());

    let uploads = vec![
        DocumentUpload { file_name: "good.txt".to_string(), bytes: long_text().into_bytes() },
        DocumentUpload { file_name: "data.xyz".to_string(), bytes: b"payload".to_vec() },
    ];
    let batch = ingestor.ingest_batch(&uploads, None).await;

    assert_eq!(batch.total, 2);
    assert_eq!(batch.successful, 1);
    assert_eq!(batch.failed, 1);

    assert!(batch.results[0].success);
    assert_eq!(batch.results[0].file_name, "good.txt");

    assert!(!batch.results[1].success);
    let error = batch.results[1].error.as_deref().unwrap();
    assert!(error.contains("unsupported file format"), "unexpected error: {error}");

    // The valid document's chunks landed despite the sibling failure.
    assert!(store.count(Some(&filename_filter("good.txt"))).await.unwrap() > 0);
}

#[tokio::test]
async fn upload_metadata_uses_the_original_filename() {
    let store = Arc::new(InMemoryDocumentStore::new(DIM));
    let ingestor = default_ingestor(store.clone());

    let result = ingestor.ingest_bytes(b"Uploaded content.", "upload.txt", None).await;
    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(store.count(Some(&filename_filter("upload.txt"))).await.unwrap(), 1);
}

#[tokio::test]
async fn ingest_url_fetches_and_stores() {
    let addr = serve_http(b"Fetched over the network.".to_vec());
    let store = Arc::new(InMemoryDocumentStore::new(DIM));
    let ingestor = default_ingestor(store.clone());

    let result = ingestor.ingest_url(&format!("http://{addr}/remote.txt"), None).await;
    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.file_name, "remote.txt");
    assert_eq!(store.count(Some(&filename_filter("remote.txt"))).await.unwrap(), 1);
}

#[tokio::test]
async fn oversized_url_body_is_rejected_mid_stream() {
    let addr = serve_http(vec![b'a'; 1 << 20]);
    let store = Arc::new(InMemoryDocumentStore::new(DIM));
    let config = IngestConfig::builder()
        .embedding_dimensions(DIM)
        .max_file_size(4096)
        .build()
        .unwrap();
    let ingestor = ingestor_with(store.clone(), config);

    let result = ingestor.ingest_url(&format!("http://{addr}/big.txt"), None).await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("file too large"));
    assert_eq!(store.count(None).await.unwrap(), 0);
}

#[tokio::test]
async fn unsupported_url_extension_is_rejected_before_download() {
    let store = Arc::new(InMemoryDocumentStore::new(DIM));
    let ingestor = default_ingestor(store.clone());

    // Nothing listens on this address; the extension check fires first.
    let result = ingestor.ingest_url("http://127.0.0.1:9/archive.zip", None).await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("unsupported file format"));
}

#[tokio::test]
async fn delete_document_reports_pre_delete_count() {
    let dir = TempDir::new().unwrap();
    let path = fixture(&dir, "doc.txt", &long_text());
    let store = Arc::new(InMemoryDocumentStore::new(DIM));
    let ingestor = default_ingestor(store.clone());

    let ingest = ingestor.ingest_file(&path, None).await;
    let chunks = ingest.chunks_created.unwrap() as u64;

    let outcome = ingestor.delete_document("doc.txt").await;
    assert!(outcome.success);
    assert_eq!(outcome.deleted_count, chunks);
    assert!(outcome.operation_id.is_some());
    assert_eq!(store.count(Some(&filename_filter("doc.txt"))).await.unwrap(), 0);
}

#[tokio::test]
async fn delete_without_matches_never_touches_the_store() {
    let store = Arc::new(CountingStore {
        inner: InMemoryDocumentStore::new(DIM),
        deletes: AtomicUsize::new(0),
    });
    let ingestor = default_ingestor(store.clone());

    let outcome = ingestor.delete_document("missing.txt").await;
    assert!(!outcome.success);
    assert_eq!(outcome.deleted_count, 0);
    assert!(outcome.error.is_some());
    assert_eq!(store.deletes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn delete_accepts_explicit_filters() {
    let store = Arc::new(InMemoryDocumentStore::new(DIM));
    let ingestor = default_ingestor(store.clone());
    let dir = TempDir::new().unwrap();
    ingestor.ingest_file(&fixture(&dir, "a.txt", "Document one."), None).await;
    ingestor.ingest_file(&fixture(&dir, "b.txt", "Document two."), None).await;

    let mut filter = MetadataFilter::new();
    filter.insert(
        "filename".to_string(),
        FilterValue::Any(vec![Value::from("a.txt"), Value::from("b.txt")]),
    );
    let outcome = ingestor.delete_document(filter).await;
    assert!(outcome.success);
    assert_eq!(outcome.deleted_count, 2);
    assert_eq!(store.count(None).await.unwrap(), 0);
}

#[tokio::test]
async fn ingest_dir_picks_up_supported_files_only() {
    let dir = TempDir::new().unwrap();
    fixture(&dir, "a.txt", "Document one.");
    fixture(&dir, "b.md", "# Document two");
    fixture(&dir, "c.xyz", "ignored");
    let store = Arc::new(InMemoryDocumentStore::new(DIM));
    let ingestor = default_ingestor(store.clone());

    let batch = ingestor.ingest_dir(dir.path(), false, None).await.unwrap();
    assert_eq!(batch.total, 2);
    assert_eq!(batch.successful, 2);
}

#[tokio::test]
async fn status_reports_documents_and_chunks() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(InMemoryDocumentStore::new(DIM));
    let ingestor = default_ingestor(store.clone());
    ingestor.ingest_file(&fixture(&dir, "a.txt", &long_text()), None).await;
    ingestor.ingest_file(&fixture(&dir, "b.txt", "Short doc."), None).await;

    let status = ingestor.status().await.unwrap();
    assert_eq!(status.document_count, 2);
    assert_eq!(status.chunk_count, store.count(None).await.unwrap());
}

#[test]
fn builder_rejects_dimension_mismatch() {
    let config = IngestConfig::builder().embedding_dimensions(DIM * 2).build().unwrap();
    let err = Ingestor::builder()
        .config(config)
        .embedder(Arc::new(HashEmbedder))
        .store(Arc::new(InMemoryDocumentStore::new(DIM)))
        .build()
        .unwrap_err();
    assert!(matches!(err, IngestError::Config(_)));
}

#[test]
fn config_rejects_overlap_not_less_than_size() {
    let err = IngestConfig::builder().chunk_size(100).chunk_overlap(100).build().unwrap_err();
    assert!(matches!(err, IngestError::Config(_)));
}
