//! `trialscout index`: build the study index and report on it.

use std::sync::Arc;

use trialscout_config::AppConfig;
use trialscout_core::EventBus;

use crate::bootstrap;

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let events = Arc::new(EventBus::default());
    let _event_log = bootstrap::spawn_event_log(&events);
    let provider = bootstrap::provider(&config)?;
    let index = bootstrap::build_index(&config, provider, events).await?;

    println!("Study index");
    println!("   Source:     {}", config.rag.data_path.display());
    println!("   Embedder:   {}", index.embedder_name());
    if let Some(stats) = index.stats() {
        println!("   Documents:  {}", stats.documents);
        println!("   Chunks:     {}", stats.chunks);
        println!("   Dimensions: {}", stats.dimensions);
        println!("   Batches:    {}", stats.batches);
        println!("   Took:       {} ms", stats.duration_ms);
    }
    Ok(())
}
