//! Embedding provider trait for converting text to vectors.

use async_trait::async_trait;

use crate::error::Result;

/// A backend that turns text into fixed-length embedding vectors.
///
/// Implementations wrap an external model or service. Batches must be
/// order-preserving: the vector at index `i` embeds the text at index `i`.
///
/// # Example
///
/// ```rust,ignore
/// use hermes_ingest::EmbeddingProvider;
///
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs, preserving
    /// input order.
    ///
    /// The default implementation embeds each input sequentially; backends
    /// with native batching should override it.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Dimensionality of the vectors produced by this provider.
    fn dimensions(&self) -> usize;
}
