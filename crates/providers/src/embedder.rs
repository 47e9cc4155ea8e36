//! Adapts a [`Provider`]'s embedding endpoint to the [`Embedder`] trait.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use trialscout_core::error::ProviderError;
use trialscout_core::provider::{EmbeddingRequest, Provider};
use trialscout_core::Embedder;

/// Embeds text through a provider's `/embeddings` endpoint with a fixed model.
pub struct ProviderEmbedder {
    provider: Arc<dyn Provider>,
    model: String,
    dimensions: Option<u32>,
    label: String,
}

impl ProviderEmbedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        let model = model.into();
        let label = format!("{}:{}", provider.name(), model);
        Self {
            provider,
            model,
            dimensions: None,
            label,
        }
    }

    /// Request shortened vectors from models that support it.
    pub fn with_dimensions(mut self, dimensions: Option<u32>) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Embedder for ProviderEmbedder {
    fn name(&self) -> &str {
        &self.label
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .provider
            .embed(EmbeddingRequest {
                model: self.model.clone(),
                inputs: inputs.to_vec(),
                dimensions: self.dimensions,
            })
            .await?;

        debug!(
            embedder = %self.label,
            inputs = inputs.len(),
            vectors = response.embeddings.len(),
            "Embedded batch"
        );

        Ok(response.embeddings)
    }
}
