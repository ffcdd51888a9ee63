use anyhow::{Context, Result};
use recode_core::config::ServiceConfig;

/// Render the effective configuration. Secrets are never included.
pub fn render_config(config: &ServiceConfig, json: bool) -> Result<String> {
    if json {
        serde_json::to_string_pretty(config).context("Failed to serialize config to JSON")
    } else {
        serde_yaml::to_string(config).context("Failed to serialize config to YAML")
    }
}

pub fn show_config_command(config: &ServiceConfig, json: bool) -> Result<()> {
    let rendered = render_config(config, json)?;
    println!("{}", rendered.trim_end());
    if config.generation.api_key.is_some() {
        eprintln!("API_KEY: set");
    }
    if config.blob.connection_string.is_some() {
        eprintln!("CONNECTION_STRING: set");
    }
    Ok(())
}
