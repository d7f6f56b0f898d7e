//! Immutable engine configuration, loaded once from environment variables
//! into a single struct rather than read ad hoc from global state.

use std::path::PathBuf;

use crate::error::{CodexfiError, Result};

/// Extraction vendor selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionProvider {
    Anthropic,
    Xai,
    Google,
}

impl ExtractionProvider {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "anthropic" => Ok(ExtractionProvider::Anthropic),
            "xai" => Ok(ExtractionProvider::Xai),
            "google" => Ok(ExtractionProvider::Google),
            other => Err(CodexfiError::Config(format!(
                "unknown EXTRACTION_PROVIDER: {other}"
            ))),
        }
    }
}

/// Empirically-tuned thresholds, kept configurable rather than baked in.
#[derive(Debug, Clone)]
pub struct SearchDefaults {
    /// Default vector-phase threshold. 0.2 is permissive; some
    /// deployments prefer a stricter 0.45 — callers choose explicitly via
    /// `SearchOptions`, this is only the engine-wide default.
    pub threshold: f32,
    /// Cosine cutoff for near-duplicate detection in the dedup engine.
    pub near_duplicate_cosine: f32,
    /// Synthetic score assigned to rows surfaced only by the enumeration
    /// union.
    pub enumeration_base_score: f32,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            threshold: 0.2,
            near_duplicate_cosine: 0.92,
            enumeration_base_score: 0.35,
        }
    }
}

/// Engine-wide configuration, built once and threaded through every
/// component rather than read from global state.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub extraction_provider: ExtractionProvider,
    pub anthropic_api_key: Option<String>,
    pub xai_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub voyage_api_key: String,
    pub embedding_dims: usize,
    pub container_tag_prefix: String,
    pub user_container_tag: Option<String>,
    pub project_container_tag: Option<String>,
    pub search_defaults: SearchDefaults,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir());

        let extraction_provider = ExtractionProvider::parse(
            &std::env::var("EXTRACTION_PROVIDER").unwrap_or_else(|_| "anthropic".to_string()),
        )?;

        let anthropic_api_key = std::env::var("ANTHROPIC_API_KEY").ok();
        let xai_api_key = std::env::var("XAI_API_KEY").ok();
        let google_api_key = std::env::var("GOOGLE_API_KEY").ok();

        let have_matching_key = match extraction_provider {
            ExtractionProvider::Anthropic => anthropic_api_key.is_some(),
            ExtractionProvider::Xai => xai_api_key.is_some(),
            ExtractionProvider::Google => google_api_key.is_some(),
        };
        if !have_matching_key {
            return Err(CodexfiError::Config(format!(
                "EXTRACTION_PROVIDER={:?} requires a matching API key",
                extraction_provider
            )));
        }

        let voyage_api_key = std::env::var("VOYAGE_API_KEY")
            .map_err(|_| CodexfiError::Config("VOYAGE_API_KEY is required".to_string()))?;

        let embedding_dims = std::env::var("EMBEDDING_DIMS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1024);

        let container_tag_prefix =
            std::env::var("CONTAINER_TAG_PREFIX").unwrap_or_else(|_| "codexfi".to_string());

        Ok(Self {
            data_dir,
            extraction_provider,
            anthropic_api_key,
            xai_api_key,
            google_api_key,
            voyage_api_key,
            embedding_dims,
            container_tag_prefix,
            user_container_tag: std::env::var("USER_CONTAINER_TAG").ok(),
            project_container_tag: std::env::var("PROJECT_CONTAINER_TAG").ok(),
            search_defaults: SearchDefaults::default(),
        })
    }

    /// Builds a config for tests without touching the environment.
    pub fn for_tests(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            extraction_provider: ExtractionProvider::Anthropic,
            anthropic_api_key: Some("test-key".to_string()),
            xai_api_key: None,
            google_api_key: None,
            voyage_api_key: "test-key".to_string(),
            embedding_dims: 32,
            container_tag_prefix: "codexfi".to_string(),
            user_container_tag: None,
            project_container_tag: None,
            search_defaults: SearchDefaults::default(),
        }
    }

    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.join("lancedb")
    }

    pub fn names_path(&self) -> PathBuf {
        self.data_dir.join("names.json")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join("ledger.json")
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(".codexfi.log")
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".codexfi")
}
