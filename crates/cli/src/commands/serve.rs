//! `trialscout serve`: build the index, then start the HTTP API.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use trialscout_config::AppConfig;
use trialscout_core::EventBus;
use trialscout_gateway::AppState;
use trialscout_registry::{ParameterExtractor, RegistryClient};

use crate::bootstrap;

pub async fn run(mut config: AppConfig, port_override: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port_override {
        config.gateway.port = port;
    }
    bootstrap::require_api_key(&config)?;

    let events = Arc::new(EventBus::default());
    let _event_log = bootstrap::spawn_event_log(&events);
    let provider = bootstrap::provider(&config)?;

    // The listener only binds once the index is queryable.
    let index = bootstrap::build_index(&config, provider.clone(), events.clone()).await?;
    let agent = bootstrap::agent(&config, provider.clone(), index.clone(), events.clone());
    let registry = RegistryClient::from_config(&config)
        .context("Failed to create registry client")?
        .with_event_bus(events);

    let state = Arc::new(AppState {
        extractor: ParameterExtractor::from_config(&config, provider),
        registry,
        agent,
        index,
    });

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    println!("TrialScout gateway");
    println!("   Listening: http://{addr}");
    println!("   Model:     {}", config.model);
    println!("   Studies:   {}", config.rag.data_path.display());
    info!(addr = %addr, "Gateway starting");

    trialscout_gateway::serve(state, &addr)
        .await
        .with_context(|| format!("Gateway failed on {addr}"))
}
