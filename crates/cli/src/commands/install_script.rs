use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use recode_core::config::ServiceConfig;
use recode_core::services::backends::post_script::install_post_script;

/// Write the Ghidra post-script into `dir` (or the configured script dir).
pub fn install_script_command(config: &ServiceConfig, dir: Option<&Path>) -> Result<PathBuf> {
    let dir = dir.unwrap_or(config.ghidra.script_dir.as_path());
    let path = install_post_script(dir)
        .with_context(|| format!("Failed to write post-script into {}", dir.display()))?;
    println!("Installed post-script at {}", path.display());
    Ok(path)
}
