//! Core data model for the codexfi memory engine.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::id::MemoryId;

/// Enumerated memory type. Unknown values from extraction or storage are
/// coerced to `Conversation` rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemoryType {
    ProjectBrief,
    Architecture,
    TechContext,
    ProductContext,
    SessionSummary,
    Progress,
    ErrorSolution,
    Preference,
    LearnedPattern,
    ProjectConfig,
    Conversation,
}

impl MemoryType {
    pub const ALL: [MemoryType; 11] = [
        MemoryType::ProjectBrief,
        MemoryType::Architecture,
        MemoryType::TechContext,
        MemoryType::ProductContext,
        MemoryType::SessionSummary,
        MemoryType::Progress,
        MemoryType::ErrorSolution,
        MemoryType::Preference,
        MemoryType::LearnedPattern,
        MemoryType::ProjectConfig,
        MemoryType::Conversation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::ProjectBrief => "project-brief",
            MemoryType::Architecture => "architecture",
            MemoryType::TechContext => "tech-context",
            MemoryType::ProductContext => "product-context",
            MemoryType::SessionSummary => "session-summary",
            MemoryType::Progress => "progress",
            MemoryType::ErrorSolution => "error-solution",
            MemoryType::Preference => "preference",
            MemoryType::LearnedPattern => "learned-pattern",
            MemoryType::ProjectConfig => "project-config",
            MemoryType::Conversation => "conversation",
        }
    }

    /// Parse a type label, coercing anything unrecognized to `Conversation`
    /// rather than erroring.
    pub fn parse_or_conversation(s: &str) -> MemoryType {
        match s {
            "project-brief" => MemoryType::ProjectBrief,
            "architecture" => MemoryType::Architecture,
            "tech-context" => MemoryType::TechContext,
            "product-context" => MemoryType::ProductContext,
            "session-summary" => MemoryType::SessionSummary,
            "progress" => MemoryType::Progress,
            "error-solution" => MemoryType::ErrorSolution,
            "preference" => MemoryType::Preference,
            "learned-pattern" => MemoryType::LearnedPattern,
            "project-config" => MemoryType::ProjectConfig,
            _ => MemoryType::Conversation,
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The canonical memory row persisted by the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRow {
    pub id: MemoryId,
    /// High-level fact surface used for ranking/display. ~500 chars.
    pub memory: String,
    /// Raw source context supporting the fact. May be empty.
    pub chunk: String,
    /// Scope key (container id). Isolation boundary for retrieval.
    pub user_id: String,
    /// Unit-norm embedding of `memory`.
    pub vector: Vec<f32>,
    /// Small keyed map, at minimum `type` and `date`.
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    /// Stable content hash of normalized `memory`.
    pub hash: String,
    /// Id of the row that superseded this one, if any.
    pub superseded_by: Option<MemoryId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MemoryRow {
    pub fn is_active(&self) -> bool {
        self.superseded_by.is_none()
    }

    /// Parses `metadata.date` as YYYY-MM-DD, if present and well formed.
    pub fn metadata_date(&self) -> Option<NaiveDate> {
        self.metadata
            .get("date")
            .and_then(|v| v.as_str())
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
    }
}

/// Input to the vector store's `insert`.
#[derive(Debug, Clone)]
pub struct NewMemoryRow {
    pub id: MemoryId,
    pub memory: String,
    pub chunk: String,
    pub user_id: String,
    pub vector: Vec<f32>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub memory_type: MemoryType,
    pub hash: String,
    pub superseded_by: Option<MemoryId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Bounded set of fields the vector store allows mutating in place.
/// Vector rewrites are permitted only through delete+insert.
#[derive(Debug, Clone, Default)]
pub struct MemoryPatch {
    pub memory: Option<String>,
    pub chunk: Option<String>,
    pub metadata: Option<HashMap<String, serde_json::Value>>,
    pub memory_type: Option<MemoryType>,
    pub superseded_by: Option<Option<MemoryId>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A row returned by `search_by_vector`, carrying its cosine score.
#[derive(Debug, Clone)]
pub struct ScoredRow {
    pub row: MemoryRow,
    pub score: f32,
}

/// Options accepted by `scan`.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub include_superseded: bool,
    pub limit: Option<usize>,
}

/// A raw conversational message ingested by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// One fact candidate returned by the extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactCandidate {
    pub memory: String,
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    #[serde(default)]
    pub chunk: Option<String>,
}

/// Extraction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractMode {
    Normal,
    Summary,
    Init,
}

/// Input role for the embedder: documents and queries may be embedded
/// differently by the underlying vendor model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedRole {
    Document,
    Query,
}

/// Outcome of a single ingested fact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum IngestEvent {
    Add { id: MemoryId, memory: String },
    Update { id: MemoryId, memory: String },
}

/// Options accepted by `ingest`.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub mode: Option<ExtractMode>,
}

/// Options accepted by `search`, as a concrete record with defaults
/// rather than a loose option bag.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    pub threshold: f32,
    pub recency_weight: f32,
    pub types: Option<Vec<MemoryType>>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 20,
            threshold: 0.2,
            recency_weight: 0.0,
            types: None,
        }
    }
}

/// A search result record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: MemoryId,
    pub memory: String,
    pub chunk: String,
    /// Final blended score, in [0, 1].
    pub score: f32,
    pub metadata: HashMap<String, serde_json::Value>,
    pub date: Option<String>,
}

/// Options accepted by `list`.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub include_superseded: bool,
    pub limit: Option<usize>,
}
