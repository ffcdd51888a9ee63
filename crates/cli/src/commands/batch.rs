use std::sync::Arc;

use anyhow::{Context, Result};
use recode_core::config::{ConfigError, ServiceConfig};
use recode_core::pipeline::{run_blob_job, BlobJobReport, BlobJobSpec};
use recode_core::services::backends::post_script::ensure_post_script;
use recode_core::services::backends::{AzureBlobStore, GhidraHeadless};
use recode_core::services::blob::BlobStore;

/// Command-line overrides for the batch job; unset values come from config.
#[derive(Debug, Clone, Default)]
pub struct BatchArgs {
    pub blob: Option<String>,
    pub source_container: Option<String>,
    pub output_container: Option<String>,
    pub create_container: bool,
}

/// Resolve the job target from flags and config.
pub fn resolve_job_spec(config: &ServiceConfig, args: &BatchArgs) -> Result<BlobJobSpec> {
    let blob_name = args
        .blob
        .clone()
        .or_else(|| config.blob.blob_name.clone())
        .ok_or(ConfigError::Missing("BLOB_NAME"))?;
    let output_container = args
        .output_container
        .clone()
        .or_else(|| config.blob.output_container.clone())
        .ok_or(ConfigError::Missing("AZURE_CONTAINER_NAME"))?;
    let source_container =
        args.source_container.clone().unwrap_or_else(|| config.blob.source_container.clone());
    Ok(BlobJobSpec { source_container, blob_name, output_container })
}

/// Run the blob batch job once. Any error aborts the job.
pub async fn batch_command(config: &ServiceConfig, args: BatchArgs) -> Result<BlobJobReport> {
    let spec = resolve_job_spec(config, &args)?;
    config.require_connection_string()?;
    let store = AzureBlobStore::from_config(&config.blob).context("Failed to create blob client")?;

    ensure_post_script(&config.ghidra.script_dir, &config.ghidra.post_script).with_context(|| {
        format!("Failed to install post-script into {}", config.ghidra.script_dir.display())
    })?;

    if args.create_container {
        store
            .ensure_container(&spec.output_container)
            .await
            .with_context(|| format!("Failed to create container '{}'", spec.output_container))?;
    }

    tracing::info!(
        blob = %spec.blob_name,
        source = %spec.source_container,
        version = recode_core::version(),
        "starting batch job"
    );
    let decompiler = Arc::new(GhidraHeadless::from_config(&config.ghidra));
    let report = run_blob_job(&store, decompiler, &config.layout(), &spec)
        .await
        .with_context(|| format!("Batch job for blob '{}' failed", spec.blob_name))?;

    println!("Decompiled {} -> {}/{}", spec.blob_name, spec.output_container, report.output_blob);
    println!("  Job: {}", report.job_id);
    println!("  Input bytes: {}", report.input_bytes);
    println!("  Output bytes: {}", report.output_bytes);
    Ok(report)
}
