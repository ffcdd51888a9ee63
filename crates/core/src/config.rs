use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::workspace::WorkspaceLayout;

pub const DEFAULT_GHIDRA_SUPPORT_DIR: &str = "/app/ghidra_10.1_PUBLIC/support";
pub const DEFAULT_GENERATION_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    /// A value required by the selected command is not configured.
    #[error("Missing required setting: {0}")]
    Missing(&'static str),
}

/// Where input binaries and decompiled output live on local disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub binary_dir: PathBuf,
    pub output_dir: PathBuf,
    pub keep_artifacts: bool,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            binary_dir: PathBuf::from("/app/binary"),
            output_dir: PathBuf::from(DEFAULT_GHIDRA_SUPPORT_DIR),
            keep_artifacts: false,
        }
    }
}

/// Ghidra headless invocation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GhidraConfig {
    /// Explicit analyzeHeadless path. Defaults to `<support_dir>/analyzeHeadless`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headless: Option<PathBuf>,
    /// Working directory for the subprocess.
    pub support_dir: PathBuf,
    /// Directory passed as `-scriptPath`.
    pub script_dir: PathBuf,
    /// Post-script file name inside `script_dir`.
    pub post_script: String,
    pub project_dir: PathBuf,
    pub project_name: String,
}

impl Default for GhidraConfig {
    fn default() -> Self {
        Self {
            headless: None,
            support_dir: PathBuf::from(DEFAULT_GHIDRA_SUPPORT_DIR),
            script_dir: PathBuf::from("/app/ghidra-headless"),
            post_script: crate::services::backends::post_script::POST_SCRIPT_NAME.to_string(),
            project_dir: PathBuf::from("/app/MyProjDir"),
            project_name: "Myproj".to_string(),
        }
    }
}

impl GhidraConfig {
    /// Resolve the analyzeHeadless executable path.
    pub fn headless_path(&self) -> PathBuf {
        self.headless.clone().unwrap_or_else(|| self.support_dir.join(headless_file_name()))
    }

    pub fn post_script_path(&self) -> PathBuf {
        self.script_dir.join(&self.post_script)
    }
}

/// Platform-specific analyzeHeadless launcher name.
pub fn headless_file_name() -> &'static str {
    if cfg!(windows) {
        "analyzeHeadless.bat"
    } else {
        "analyzeHeadless"
    }
}

/// Text-generation API settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub endpoint: String,
    /// Never written back out; supplied through `API_KEY`.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Overall request timeout; `None` leaves the transport default.
    pub timeout_secs: Option<u64>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_GENERATION_ENDPOINT.to_string(),
            api_key: None,
            timeout_secs: Some(120),
        }
    }
}

/// Blob storage settings for the batch variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    /// Never written back out; supplied through `CONNECTION_STRING`.
    #[serde(skip_serializing)]
    pub connection_string: Option<String>,
    pub blob_name: Option<String>,
    pub source_container: String,
    pub output_container: Option<String>,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            connection_string: None,
            blob_name: None,
            source_container: "binaries".to_string(),
            output_container: None,
            max_retries: 3,
            retry_delay_ms: 200,
        }
    }
}

/// HTTP server settings for the local variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0:5000".to_string(), max_upload_bytes: 10 << 20 }
    }
}

/// Serializable configuration for both service variants.
///
/// Built from defaults, then an optional YAML file, then environment
/// variables (see [`ServiceConfig::apply_env`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub workspace: WorkspaceConfig,
    pub ghidra: GhidraConfig,
    pub generation: GenerationConfig,
    pub blob: BlobConfig,
    pub server: ServerConfig,
}

impl ServiceConfig {
    /// Load configuration from an optional YAML file and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_yaml_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let body = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_yaml_str(&body)
    }

    pub fn from_yaml_str(body: &str) -> Result<Self, ConfigError> {
        if body.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(body)?)
    }

    /// Overlay environment variables using `lookup`; empty values are ignored.
    ///
    /// Precedence for the headless path mirrors the usual Ghidra setup:
    /// `GHIDRA_ANALYZE_HEADLESS` points at the executable directly, while
    /// `GHIDRA_INSTALL_DIR` only moves the support directory.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("CONNECTION_STRING") {
            self.blob.connection_string = Some(v);
        }
        if let Some(v) = get("BLOB_NAME") {
            self.blob.blob_name = Some(v);
        }
        if let Some(v) = get("AZURE_CONTAINER_NAME") {
            self.blob.output_container = Some(v);
        }
        if let Some(v) = get("API_KEY") {
            self.generation.api_key = Some(v);
        }
        if let Some(v) = get("GHIDRA_INSTALL_DIR") {
            self.ghidra.support_dir = PathBuf::from(v).join("support");
        }
        if let Some(v) = get("GHIDRA_ANALYZE_HEADLESS") {
            self.ghidra.headless = Some(PathBuf::from(v));
        }
        if let Some(v) = get("RECODE_BIND") {
            self.server.bind = v;
        }
    }

    pub fn layout(&self) -> WorkspaceLayout {
        WorkspaceLayout::new(&self.workspace.binary_dir, &self.workspace.output_dir)
            .with_keep_artifacts(self.workspace.keep_artifacts)
    }

    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.generation.api_key.as_deref().ok_or(ConfigError::Missing("API_KEY"))
    }

    pub fn require_connection_string(&self) -> Result<&str, ConfigError> {
        self.blob.connection_string.as_deref().ok_or(ConfigError::Missing("CONNECTION_STRING"))
    }

    pub fn require_blob_name(&self) -> Result<&str, ConfigError> {
        self.blob.blob_name.as_deref().ok_or(ConfigError::Missing("BLOB_NAME"))
    }

    pub fn require_output_container(&self) -> Result<&str, ConfigError> {
        self.blob.output_container.as_deref().ok_or(ConfigError::Missing("AZURE_CONTAINER_NAME"))
    }
}
