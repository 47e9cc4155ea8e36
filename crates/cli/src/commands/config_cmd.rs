//! `trialscout config`: print the effective configuration.

use std::path::Path;

use trialscout_config::AppConfig;

pub fn run(config: &AppConfig, path: Option<&Path>) -> anyhow::Result<()> {
    let path = path.map_or_else(|| AppConfig::config_dir().join("config.toml"), Path::to_path_buf);
    println!("# {}", path.display());
    if !config.has_api_key() {
        println!("# No API key set (OPENAI_API_KEY or TRIALSCOUT_API_KEY)");
    }
    println!("{}", config.to_redacted_toml());
    Ok(())
}
