//! codexfi - persistent, per-developer memory for AI coding agents.
//!
//! Ingests conversation messages, extracts typed facts via an LLM,
//! embeds and deduplicates them, and serves ranked, scope-isolated
//! retrieval over them. See [`Engine`] for the entry point.

pub mod config;
pub mod dedup;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod extraction;
pub mod id;
pub mod ingest;
pub mod lifecycle;
pub mod logging;
pub mod privacy;
pub mod retrieval;
pub mod retry;
pub mod scope;
pub mod store;
pub mod types;

pub mod testing;

pub use config::Config;
pub use engine::Engine;
pub use error::{CodexfiError, Result};
pub use id::MemoryId;
pub use types::*;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
