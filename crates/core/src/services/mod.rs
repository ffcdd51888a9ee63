//! Adapters for the external collaborators.
//!
//! Each concern is a narrow trait (`Decompiler`, `TextGenerator`,
//! `BlobStore`) with its concrete backend under `backends`, so tests can
//! substitute stubs without spawning processes or touching the network.

pub mod backends;
pub mod blob;
pub mod decompiler;
pub mod generation;
