//! Embedder trait: text to fixed-dimension vectors.
//!
//! The vector index embeds chunk texts at build time and query texts at
//! query time through the same embedder, so both live in one space.

use async_trait::async_trait;

use crate::error::ProviderError;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// A human-readable name (e.g., "openai:text-embedding-3-small").
    fn name(&self) -> &str;

    /// Embed a batch of texts. Returns one vector per input, in input order.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Embed a single text.
    async fn embed_one(&self, input: &str) -> Result<Vec<f32>, ProviderError> {
        let mut vectors = self.embed(&[input.to_string()]).await?;
        match vectors.len() {
            1 => Ok(vectors.remove(0)),
            n => Err(ProviderError::InvalidResponse(format!(
                "expected 1 embedding, got {n}"
            ))),
        }
    }
}
