//! recode-core
//!
//! Core library for relaying headless decompiler output to a text-generation API.
//!
//! This crate defines the artifact naming rules, the per-job workspace layout,
//! service configuration, and the adapters for the external collaborators:
//! the Ghidra headless analyzer, the generative-language API, and Azure Blob
//! storage. The two pipelines (blob batch job and decompile-and-annotate)
//! are composed from those adapters.
//!
//! All substantive logic lives here so it is fully testable and reusable from
//! the CLI and the HTTP frontend.

pub mod config;
pub mod naming;
pub mod pipeline;
pub mod prompts;
pub mod services;
pub mod workspace;

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
