pub mod azure;
pub mod gemini;
pub mod ghidra;
pub mod post_script;

pub use azure::AzureBlobStore;
pub use gemini::GeminiClient;
pub use ghidra::GhidraHeadless;
