//! `trialscout search`: patient description → registry studies.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use trialscout_config::AppConfig;
use trialscout_core::EventBus;
use trialscout_registry::{ParameterExtractor, RegistryClient};

use crate::bootstrap;

pub async fn run(config: AppConfig, input: String, output: Option<PathBuf>) -> anyhow::Result<()> {
    bootstrap::require_api_key(&config)?;

    let events = Arc::new(EventBus::default());
    let _event_log = bootstrap::spawn_event_log(&events);
    let provider = bootstrap::provider(&config)?;
    let extractor = ParameterExtractor::from_config(&config, provider);
    let registry = RegistryClient::from_config(&config)
        .context("Failed to create registry client")?
        .with_event_bus(events);

    let params = extractor.extract(&input).await?;
    eprintln!("  Parameters: {}", serde_json::to_string(&params)?);

    let studies = registry.fetch_studies(&params).await?;
    let records: Vec<serde_json::Value> = studies.into_iter().map(|s| s.into_value()).collect();
    let rendered = serde_json::to_string_pretty(&records)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(&path, rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("  Wrote {} studies to {}", records.len(), path.display());
        }
        None => {
            println!("{rendered}");
            eprintln!("  {} studies", records.len());
        }
    }

    Ok(())
}
