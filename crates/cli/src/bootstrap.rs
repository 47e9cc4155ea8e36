//! Wiring shared by the commands: provider, embedder, index, agent.

use std::sync::Arc;

use anyhow::{Context, bail};
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;
use trialscout_agent::AnsweringAgent;
use trialscout_config::{AppConfig, EmbeddingBackend};
use trialscout_core::{Embedder, EventBus, Provider};
use trialscout_index::hashing::DEFAULT_HASHING_DIMENSIONS;
use trialscout_index::{HashingEmbedder, IndexHandle, RagSettings, initialize_with_events, load_records};
use trialscout_providers::ProviderEmbedder;

pub fn provider(config: &AppConfig) -> anyhow::Result<Arc<dyn Provider>> {
    trialscout_providers::build_from_config(config).context("Failed to create provider")
}

/// Fail early with setup instructions when a command needs the model.
pub fn require_api_key(config: &AppConfig) -> anyhow::Result<()> {
    if config.has_api_key() {
        return Ok(());
    }
    bail!(
        "No API key configured. Set OPENAI_API_KEY or TRIALSCOUT_API_KEY (a .env file works), \
         or add api_key to {}",
        AppConfig::config_dir().join("config.toml").display()
    )
}

pub fn embedder(config: &AppConfig, provider: Arc<dyn Provider>) -> Arc<dyn Embedder> {
    match config.rag.embedding_provider {
        EmbeddingBackend::OpenAi => Arc::new(
            ProviderEmbedder::new(provider, config.rag.embedding_model.clone())
                .with_dimensions(config.rag.embedding_dimensions),
        ),
        EmbeddingBackend::Hashing => Arc::new(HashingEmbedder::new(
            config
                .rag
                .embedding_dimensions
                .map_or(DEFAULT_HASHING_DIMENSIONS, |d| d as usize),
        )),
    }
}

pub fn rag_settings(config: &AppConfig) -> RagSettings {
    RagSettings {
        chunk_size: config.rag.chunk_size,
        chunk_overlap: config.rag.chunk_overlap,
        embed_batch_size: config.rag.embed_batch_size,
    }
}

/// Load the persisted study records and build the index from them.
pub async fn build_index(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
    events: Arc<EventBus>,
) -> anyhow::Result<IndexHandle> {
    if config.rag.embedding_provider == EmbeddingBackend::OpenAi {
        require_api_key(config)?;
    }

    let path = &config.rag.data_path;
    let records = load_records(path)
        .with_context(|| format!("Failed to load study records from {}", path.display()))?;

    initialize_with_events(&records, &rag_settings(config), embedder(config, provider), Some(events))
        .await
        .context("Failed to build the study index")
}

pub fn agent(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
    index: IndexHandle,
    events: Arc<EventBus>,
) -> AnsweringAgent {
    let tools = Arc::new(trialscout_tools::default_registry(index, config.rag.top_k));
    AnsweringAgent::from_config(config, provider, tools, events)
}

/// Log every domain event at debug level until the bus closes.
pub fn spawn_event_log(events: &EventBus) -> tokio::task::JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => debug!(event = ?event, "Domain event"),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Event log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}
