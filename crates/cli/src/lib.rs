use std::path::Path;

use anyhow::{Context, Result};
use recode_core::config::ServiceConfig;
use tracing_subscriber::EnvFilter;

pub mod commands;
pub mod server;

/// Install the global tracing subscriber, writing to stderr.
///
/// An unparsable `filter` falls back to `info`. Calling this more than once
/// (e.g. from tests) is harmless.
pub fn init_tracing(filter: &str) {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Load the effective configuration: defaults, optional YAML file, environment.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig> {
    match path {
        Some(p) => ServiceConfig::load(Some(p))
            .with_context(|| format!("Failed to load config from {}", p.display())),
        None => ServiceConfig::load(None).context("Failed to load config"),
    }
}
