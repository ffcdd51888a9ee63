use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::naming::ArtifactName;

/// Logical layout of the service's scratch directories on disk.
///
/// This is derived from the configured roots. It does *not* perform any IO
/// itself; per-job directories are created by [`JobWorkspace::prepare`].
#[derive(Debug, Clone)]
pub struct WorkspaceLayout {
    /// Root under which input binaries are stored, one directory per job.
    pub binary_dir: PathBuf,
    /// Root under which decompiled output is written, one directory per job.
    pub output_dir: PathBuf,
    /// Keep per-job directories after the job finishes (debugging aid).
    pub keep_artifacts: bool,
}

impl WorkspaceLayout {
    pub fn new(binary_dir: impl AsRef<Path>, output_dir: impl AsRef<Path>) -> Self {
        Self {
            binary_dir: binary_dir.as_ref().to_path_buf(),
            output_dir: output_dir.as_ref().to_path_buf(),
            keep_artifacts: false,
        }
    }

    pub fn with_keep_artifacts(mut self, keep: bool) -> Self {
        self.keep_artifacts = keep;
        self
    }

    /// Allocate a fresh job workspace for `artifact`.
    ///
    /// Every job gets its own identifier, so two requests for the same
    /// artifact name never share an input or output path.
    pub fn job(&self, artifact: &ArtifactName) -> JobWorkspace {
        let id = Uuid::new_v4().simple().to_string();
        let job_binary_dir = self.binary_dir.join(&id);
        let job_output_dir = self.output_dir.join(&id);
        JobWorkspace {
            binary_path: job_binary_dir.join(artifact.binary_file_name()),
            output_path: job_output_dir.join(artifact.output_file_name()),
            binary_dir: job_binary_dir,
            output_dir: job_output_dir,
            artifact: artifact.clone(),
            keep_artifacts: self.keep_artifacts,
            id,
        }
    }
}

/// Paths owned by a single decompilation job.
#[derive(Debug, Clone)]
pub struct JobWorkspace {
    pub id: String,
    pub artifact: ArtifactName,
    pub binary_dir: PathBuf,
    pub output_dir: PathBuf,
    /// `<binary_dir>/<id>/<stem>.exe`
    pub binary_path: PathBuf,
    /// `<output_dir>/<id>/<stem>.c`
    pub output_path: PathBuf,
    keep_artifacts: bool,
}

impl JobWorkspace {
    /// Create the per-job input and output directories.
    pub fn prepare(&self) -> io::Result<()> {
        fs::create_dir_all(&self.binary_dir)?;
        fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }

    /// Remove the per-job directories unless artifacts are being kept.
    ///
    /// Already-missing directories are not an error.
    pub fn cleanup(&self) -> io::Result<()> {
        if self.keep_artifacts {
            tracing::debug!(job = %self.id, "keeping job artifacts");
            return Ok(());
        }
        for dir in [&self.binary_dir, &self.output_dir] {
            match fs::remove_dir_all(dir) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}
