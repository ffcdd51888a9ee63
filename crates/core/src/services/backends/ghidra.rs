use std::path::PathBuf;
use std::process::Command;

use crate::config::GhidraConfig;
use crate::services::decompiler::{DecompileError, DecompileOutput, DecompileRequest, Decompiler};

/// Ghidra headless backend: imports the binary into a throwaway project and
/// runs the post-script that writes decompiled C to the requested path.
#[derive(Debug, Clone)]
pub struct GhidraHeadless {
    pub headless: PathBuf,
    pub support_dir: PathBuf,
    pub script_dir: PathBuf,
    pub post_script: String,
    pub project_dir: PathBuf,
    pub project_name: String,
}

impl GhidraHeadless {
    pub fn from_config(config: &GhidraConfig) -> Self {
        Self {
            headless: config.headless_path(),
            support_dir: config.support_dir.clone(),
            script_dir: config.script_dir.clone(),
            post_script: config.post_script.clone(),
            project_dir: config.project_dir.clone(),
            project_name: config.project_name.clone(),
        }
    }

    /// Per-job project name so concurrent imports never share a Ghidra project.
    pub fn project_name_for(&self, job_id: &str) -> String {
        format!("{}-{}", self.project_name, job_id)
    }

    /// Argument list passed to analyzeHeadless for `request`.
    pub fn arguments(&self, request: &DecompileRequest) -> Vec<String> {
        vec![
            self.project_dir.display().to_string(),
            self.project_name_for(&request.job_id),
            "-import".to_string(),
            request.binary_path.display().to_string(),
            "-scriptPath".to_string(),
            self.script_dir.display().to_string(),
            "-postScript".to_string(),
            self.post_script.clone(),
            request.output_path.display().to_string(),
            "-deleteProject".to_string(),
        ]
    }
}

impl Decompiler for GhidraHeadless {
    fn decompile(&self, request: &DecompileRequest) -> Result<DecompileOutput, DecompileError> {
        if !request.binary_path.is_file() {
            return Err(DecompileError::MissingBinary(request.binary_path.clone()));
        }
        if !self.headless.is_file() {
            return Err(DecompileError::MissingTool(self.headless.clone()));
        }
        std::fs::create_dir_all(&self.project_dir).map_err(|source| DecompileError::Prepare {
            path: self.project_dir.clone(),
            source,
        })?;

        tracing::info!(
            job = %request.job_id,
            binary = %request.binary_path.display(),
            "starting decompilation"
        );
        let output = Command::new(&self.headless)
            .args(self.arguments(request))
            .current_dir(&self.support_dir)
            .output()
            .map_err(|source| DecompileError::Spawn { tool: self.headless.clone(), source })?;

        let log = combined_output(&output.stdout, &output.stderr);
        if !output.status.success() {
            tracing::error!(job = %request.job_id, status = %output.status, "decompilation failed\n{log}");
            return Err(DecompileError::Failed { status: output.status, log });
        }
        tracing::debug!(job = %request.job_id, "decompiler output\n{log}");

        if !request.output_path.is_file() {
            return Err(DecompileError::MissingOutput(request.output_path.clone()));
        }
        tracing::info!(job = %request.job_id, output = %request.output_path.display(), "decompilation completed");

        Ok(DecompileOutput { output_path: request.output_path.clone(), log })
    }

    fn name(&self) -> &'static str {
        "ghidra"
    }
}

/// Interleaving is lost once the streams are captured separately; stdout comes
/// first, then stderr.
fn combined_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut log = String::from_utf8_lossy(stdout).into_owned();
    let err = String::from_utf8_lossy(stderr);
    if !err.is_empty() {
        if !log.is_empty() && !log.ends_with('\n') {
            log.push('\n');
        }
        log.push_str(&err);
    }
    log
}
