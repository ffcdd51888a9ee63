//! The two job flows, composed from the service adapters.
//!
//! - blob batch: download, decompile, upload the C output.
//! - annotate: decompile an already-stored binary and send the C output to
//!   the text generator with the documentation prompt.
//!
//! Both return errors to the caller instead of terminating; the frontend
//! chooses the exit code or HTTP status.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Instrument;

use crate::naming::ArtifactName;
use crate::prompts::documentation_prompt;
use crate::services::blob::{BlobError, BlobStore};
use crate::services::decompiler::{DecompileError, DecompileRequest, Decompiler};
use crate::services::generation::{GenerationError, TextGenerator};
use crate::workspace::{JobWorkspace, WorkspaceLayout};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Blob(#[from] BlobError),
    #[error(transparent)]
    Decompile(#[from] DecompileError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("Decompiler task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl PipelineError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        PipelineError::Io { path: path.to_path_buf(), source }
    }
}

/// Where a batch job reads its binary and publishes the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobJobSpec {
    pub source_container: String,
    pub blob_name: String,
    pub output_container: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobJobReport {
    pub job_id: String,
    pub artifact: ArtifactName,
    /// Name the decompiled output was uploaded under (`<stem>.c`).
    pub output_blob: String,
    pub input_bytes: usize,
    pub output_bytes: usize,
}

/// Download `spec.blob_name`, decompile it, and upload `<stem>.c` to the
/// output container. The job workspace is removed afterwards, on success or
/// failure.
pub async fn run_blob_job(
    store: &dyn BlobStore,
    decompiler: Arc<dyn Decompiler>,
    layout: &WorkspaceLayout,
    spec: &BlobJobSpec,
) -> Result<BlobJobReport, PipelineError> {
    let artifact = ArtifactName::from_file_name(&spec.blob_name);
    let job = layout.job(&artifact);
    let span = tracing::info_span!("blob_job", job = %job.id, blob = %spec.blob_name);

    let result = async {
        job.prepare().map_err(|e| PipelineError::io(&job.binary_dir, e))?;

        let binary = store.download(&spec.source_container, &spec.blob_name).await?;
        let input_bytes = binary.len();
        write_binary(&job.binary_path, &binary).await?;
        tracing::info!(path = %job.binary_path.display(), bytes = input_bytes, "binary stored");

        let decompiled = decompile_job(decompiler, &job).await?;
        let output_blob = artifact.output_file_name();
        let output_bytes = decompiled.len();
        store.upload(&spec.output_container, &output_blob, decompiled).await?;
        tracing::info!(container = %spec.output_container, blob = %output_blob, "decompiled output uploaded");

        Ok(BlobJobReport {
            job_id: job.id.clone(),
            artifact: artifact.clone(),
            output_blob,
            input_bytes,
            output_bytes,
        })
    }
    .instrument(span)
    .await;

    cleanup(&job);
    result
}

/// Decompile the binary already stored at `job.binary_path` and return the
/// generated annotation of its C output.
///
/// The caller owns `job` and is responsible for cleaning it up.
pub async fn decompile_and_annotate(
    decompiler: Arc<dyn Decompiler>,
    generator: &dyn TextGenerator,
    job: &JobWorkspace,
) -> Result<String, PipelineError> {
    let decompiled = decompile_job(decompiler, job).await?;
    let code = String::from_utf8_lossy(&decompiled);
    let prompt = documentation_prompt(&code);
    tracing::info!(job = %job.id, generator = generator.name(), "requesting annotation");
    Ok(generator.generate(&prompt).await?)
}

/// Run the decompiler off the async runtime and read back its output file.
pub async fn decompile_job(
    decompiler: Arc<dyn Decompiler>,
    job: &JobWorkspace,
) -> Result<Vec<u8>, PipelineError> {
    job.prepare().map_err(|e| PipelineError::io(&job.output_dir, e))?;
    let request = DecompileRequest::for_job(job);
    tracing::debug!(job = %job.id, backend = decompiler.name(), "dispatching decompiler");
    let output = tokio::task::spawn_blocking(move || decompiler.decompile(&request)).await??;
    tokio::fs::read(&output.output_path)
        .await
        .map_err(|e| PipelineError::io(&output.output_path, e))
}

async fn write_binary(path: &Path, data: &[u8]) -> Result<(), PipelineError> {
    tokio::fs::write(path, data).await.map_err(|e| PipelineError::io(path, e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644))
            .await
            .map_err(|e| PipelineError::io(path, e))?;
    }
    Ok(())
}

/// Remove the job's directories, logging instead of failing.
pub fn cleanup(job: &JobWorkspace) {
    if let Err(e) = job.cleanup() {
        tracing::warn!(job = %job.id, "failed to clean up job workspace: {e}");
    }
}
