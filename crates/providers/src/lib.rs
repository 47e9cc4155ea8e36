//! LLM provider implementations for TrialScout.
//!
//! All providers implement the `trialscout_core::Provider` trait.
//! [`build_from_config`] constructs the one provider the application talks to.

pub mod embedder;
pub mod openai_compat;

use std::sync::Arc;
use std::time::Duration;

use trialscout_config::AppConfig;
use trialscout_core::error::ProviderError;
use trialscout_core::Provider;

pub use embedder::ProviderEmbedder;
pub use openai_compat::OpenAiCompatProvider;

/// Build the chat/embedding provider described by the configuration.
///
/// A missing API key is not an error here: offline paths (hashing
/// embeddings, `index`, `config`) never call the provider.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    if !config.has_api_key() {
        tracing::warn!("No API key configured; reasoning and embedding calls will fail");
    }

    let provider = OpenAiCompatProvider::with_timeout(
        provider_label(&config.api_url),
        &config.api_url,
        config.api_key.clone().unwrap_or_default(),
        Duration::from_secs(config.request_timeout_secs),
    )?;

    Ok(Arc::new(provider))
}

/// A short name for the endpoint, used in logs.
fn provider_label(api_url: &str) -> &'static str {
    if api_url.contains("api.openai.com") {
        "openai"
    } else if api_url.contains("openrouter.ai") {
        "openrouter"
    } else if api_url.contains("localhost") || api_url.contains("127.0.0.1") {
        "local"
    } else {
        "custom"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_from_default_config() {
        let config = AppConfig::default();
        let provider = build_from_config(&config).unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn labels_known_endpoints() {
        assert_eq!(provider_label("https://openrouter.ai/api/v1"), "openrouter");
        assert_eq!(provider_label("http://localhost:11434/v1"), "local");
        assert_eq!(provider_label("https://llm.internal.example/v1"), "custom");
    }
}
