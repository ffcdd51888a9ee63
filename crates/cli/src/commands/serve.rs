use std::sync::Arc;

use anyhow::{Context, Result};
use recode_core::config::ServiceConfig;
use recode_core::services::backends::post_script::ensure_post_script;
use recode_core::services::backends::{GeminiClient, GhidraHeadless};
use tokio::net::TcpListener;

use crate::server::{self, build_router, AppState};

/// Run the local HTTP variant until interrupted.
pub async fn serve_command(config: &ServiceConfig, bind: Option<String>) -> Result<()> {
    config.require_api_key()?;
    let generator =
        GeminiClient::from_config(&config.generation).context("Failed to create generation client")?;

    ensure_post_script(&config.ghidra.script_dir, &config.ghidra.post_script).with_context(|| {
        format!("Failed to install post-script into {}", config.ghidra.script_dir.display())
    })?;
    let decompiler = GhidraHeadless::from_config(&config.ghidra);
    if !decompiler.headless.is_file() {
        tracing::warn!(
            path = %decompiler.headless.display(),
            "analyzeHeadless not found; /decompile will fail until it is installed"
        );
    }

    let state = AppState::new(Arc::new(decompiler), Arc::new(generator), config.layout());
    let router = build_router(state, config.server.max_upload_bytes);

    let addr = bind.unwrap_or_else(|| config.server.bind.clone());
    let listener =
        TcpListener::bind(&addr).await.with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(addr = %listener.local_addr()?, version = recode_core::version(), "server listening");

    server::serve(listener, router).await.context("Server terminated with an error")
}
