use std::path::PathBuf;
use std::process::ExitStatus;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::workspace::JobWorkspace;

/// Request to decompile one binary into one output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecompileRequest {
    /// Job identifier; backends use it to keep per-job tool state apart.
    pub job_id: String,
    pub binary_path: PathBuf,
    /// Where the decompiled C text must be written.
    pub output_path: PathBuf,
}

impl DecompileRequest {
    pub fn for_job(job: &JobWorkspace) -> Self {
        Self {
            job_id: job.id.clone(),
            binary_path: job.binary_path.clone(),
            output_path: job.output_path.clone(),
        }
    }
}

/// Result of a successful decompilation.
///
/// The decompiled text itself is a side-effect file at `output_path`; `log`
/// is the tool's combined output, kept for diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecompileOutput {
    pub output_path: PathBuf,
    pub log: String,
}

#[derive(Debug, Error)]
pub enum DecompileError {
    #[error("Binary not found at {0}")]
    MissingBinary(PathBuf),
    #[error("Decompiler not found at {0}")]
    MissingTool(PathBuf),
    #[error("Failed to prepare {path}: {source}")]
    Prepare {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to spawn decompiler {tool}: {source}")]
    Spawn {
        tool: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Decompilation failed ({status})")]
    Failed { status: ExitStatus, log: String },
    #[error("Decompiler finished but wrote no output at {0}")]
    MissingOutput(PathBuf),
}

/// Trait implemented by decompiler backends (e.g., Ghidra headless).
pub trait Decompiler: Send + Sync {
    fn decompile(&self, request: &DecompileRequest) -> Result<DecompileOutput, DecompileError>;
    fn name(&self) -> &'static str;
}
