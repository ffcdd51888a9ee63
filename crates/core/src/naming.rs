//! Artifact naming.
//!
//! A single logical name governs both the local path of an input binary and
//! the name its decompiled output is published under. `ArtifactName` is
//! computed once per job so the two ends cannot drift apart.

use serde::{Deserialize, Serialize};

/// Executable suffix stripped from incoming file names.
pub const EXECUTABLE_SUFFIX: &str = ".exe";

/// Extension appended to decompiled output artifacts.
pub const OUTPUT_EXTENSION: &str = ".c";

/// File name used when a client uploads a file without a usable name.
pub const DEFAULT_FILE_NAME: &str = "uploaded_binary.exe";

/// Strip one trailing `.exe` from `name`; any other name is returned unchanged.
pub fn sanitize_file_name(name: &str) -> String {
    name.strip_suffix(EXECUTABLE_SUFFIX).unwrap_or(name).to_string()
}

/// Sanitized logical name shared by a binary and its decompiled output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactName {
    stem: String,
}

impl ArtifactName {
    /// Derive the artifact name from a client- or blob-supplied file name.
    ///
    /// Only the final path component is kept, so names like `../../etc/x.exe`
    /// or `uploads/x.exe` resolve to `x`. Empty or dot-only names fall back to
    /// [`DEFAULT_FILE_NAME`].
    pub fn from_file_name(name: &str) -> Self {
        let base = name.rsplit(['/', '\\']).next().unwrap_or("").trim();
        let base = match base {
            "" | "." | ".." => DEFAULT_FILE_NAME,
            other => other,
        };

        let stem = sanitize_file_name(base);
        if stem.is_empty() {
            return Self { stem: sanitize_file_name(DEFAULT_FILE_NAME) };
        }
        Self { stem }
    }

    /// Like [`ArtifactName::from_file_name`], treating a missing name as empty.
    pub fn from_upload(name: Option<&str>) -> Self {
        Self::from_file_name(name.unwrap_or(""))
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Local file name of the input binary (`<stem>.exe`).
    pub fn binary_file_name(&self) -> String {
        format!("{}{}", self.stem, EXECUTABLE_SUFFIX)
    }

    /// Name the decompiled output is published under (`<stem>.c`).
    pub fn output_file_name(&self) -> String {
        format!("{}{}", self.stem, OUTPUT_EXTENSION)
    }
}

impl std::fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.stem)
    }
}
