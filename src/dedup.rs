//! Dedup & versioning engine: exact-hash dedup, near-duplicate
//! supersession, and type-specific uniqueness rules (progress singleton,
//! session-summary compression), driven by a `TYPE_PAIR_POLICY` data
//! table rather than scattered branches.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::embedding::EmbedderCapability;
use crate::error::Result;
use crate::extraction::ExtractorCapability;
use crate::id::MemoryId;
use crate::store::VectorStore;
use crate::types::{
    EmbedRole, ExtractMode, FactCandidate, IngestEvent, MemoryPatch, MemoryType, NewMemoryRow,
    ScanOptions,
};

/// How a near-duplicate hit is resolved. Both variants end up performing
/// the same store mutation (insert + supersede); they are kept distinct
/// because the type groupings that trigger them are conceptually
/// different (a status row going stale vs. a fact being corrected) and a
/// future caller may want to branch on which one fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DuplicatePolicy {
    /// The new row supersedes the old one because the old one is a stale
    /// status snapshot, not a correction.
    Supersede,
    /// The new row supersedes the old one because it corrects a durable
    /// fact; the old row is kept (inactive) for history.
    KnowledgeUpdate,
    /// No new row; the existing row is mutated in place.
    InPlace,
}

/// Maps the *incoming* fact's type to a near-duplicate resolution policy.
/// Near-duplicate candidates are, by construction, about the same subject
/// as the incoming fact, so the incoming type is the meaningful signal.
const TYPE_PAIR_POLICY: &[(MemoryType, DuplicatePolicy)] = &[
    (MemoryType::Progress, DuplicatePolicy::Supersede),
    (MemoryType::SessionSummary, DuplicatePolicy::Supersede),
    (MemoryType::ErrorSolution, DuplicatePolicy::Supersede),
    (MemoryType::Preference, DuplicatePolicy::KnowledgeUpdate),
    (MemoryType::ProjectConfig, DuplicatePolicy::KnowledgeUpdate),
    (MemoryType::TechContext, DuplicatePolicy::KnowledgeUpdate),
];

fn policy_for(memory_type: MemoryType) -> DuplicatePolicy {
    TYPE_PAIR_POLICY
        .iter()
        .find(|(t, _)| *t == memory_type)
        .map(|(_, p)| *p)
        .unwrap_or(DuplicatePolicy::InPlace)
}

const NEAR_DUPLICATE_CANDIDATES: usize = 3;
/// Active `session-summary` rows beyond this count trigger compression of
/// the oldest into a `learned-pattern`.
const SESSION_SUMMARY_CAP: usize = 2;

/// Normalizes text for hashing: lowercase, collapse interior whitespace,
/// trim.
pub fn normalize_memory(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = false;
    for ch in text.trim().chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.extend(ch.to_lowercase());
            last_was_space = false;
        }
    }
    out
}

/// Stable content hash of normalized `memory`.
pub fn compute_hash(memory: &str) -> String {
    let normalized = normalize_memory(memory);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

pub struct DedupEngine {
    store: VectorStore,
    embedder: Arc<dyn EmbedderCapability>,
    extractor: Arc<dyn ExtractorCapability>,
    near_duplicate_cosine: f32,
}

impl DedupEngine {
    pub fn new(
        store: VectorStore,
        embedder: Arc<dyn EmbedderCapability>,
        extractor: Arc<dyn ExtractorCapability>,
        near_duplicate_cosine: f32,
    ) -> Self {
        Self {
            store,
            embedder,
            extractor,
            near_duplicate_cosine,
        }
    }

    /// Resolves one incoming `(fact, vector)` pair against the existing
    /// store state for `user_id`, performing whatever store mutation the
    /// resolution implies, and returns the resulting event.
    pub async fn process(
        &self,
        fact: &FactCandidate,
        vector: Vec<f32>,
        user_id: &str,
    ) -> Result<IngestEvent> {
        let hash = compute_hash(&fact.memory);

        if let Some(existing) = self.find_active_by_hash(user_id, &hash)? {
            return self.update_in_place(existing.id, fact.chunk.as_deref(), existing.chunk.len());
        }

        let candidates = self
            .store
            .search_by_vector(&vector, user_id, NEAR_DUPLICATE_CANDIDATES, self.near_duplicate_cosine)?;

        if let Some(hit) = candidates.into_iter().next() {
            match policy_for(fact.memory_type) {
                DuplicatePolicy::InPlace => {
                    return self.update_in_place(hit.row.id, fact.chunk.as_deref(), hit.row.chunk.len());
                }
                DuplicatePolicy::Supersede | DuplicatePolicy::KnowledgeUpdate => {
                    let new_id = self.insert_fresh(fact, vector, user_id, None)?;
                    self.store.update(
                        hit.row.id,
                        &MemoryPatch {
                            superseded_by: Some(Some(new_id)),
                            updated_at: Some(Utc::now()),
                            ..Default::default()
                        },
                    )?;
                    self.apply_type_uniqueness(fact.memory_type, new_id, user_id).await?;
                    return Ok(IngestEvent::Update {
                        id: new_id,
                        memory: fact.memory.clone(),
                    });
                }
            }
        }

        let new_id = self.insert_fresh(fact, vector, user_id, None)?;
        self.apply_type_uniqueness(fact.memory_type, new_id, user_id).await?;
        Ok(IngestEvent::Add {
            id: new_id,
            memory: fact.memory.clone(),
        })
    }

    fn find_active_by_hash(
        &self,
        user_id: &str,
        hash: &str,
    ) -> Result<Option<crate::types::MemoryRow>> {
        let rows = self.store.scan(user_id, &ScanOptions::default())?;
        Ok(rows.into_iter().find(|r| r.hash == hash))
    }

    fn update_in_place(
        &self,
        id: MemoryId,
        new_chunk: Option<&str>,
        existing_chunk_len: usize,
    ) -> Result<IngestEvent> {
        let chunk = match new_chunk {
            Some(c) if c.len() > existing_chunk_len => Some(c.to_string()),
            _ => None,
        };
        let row = self.store.get(id)?.ok_or_else(|| {
            crate::error::CodexfiError::NotFound(id.to_string())
        })?;
        self.store.update(
            id,
            &MemoryPatch {
                chunk,
                updated_at: Some(Utc::now()),
                ..Default::default()
            },
        )?;
        Ok(IngestEvent::Update {
            id,
            memory: row.memory,
        })
    }

    fn insert_fresh(
        &self,
        fact: &FactCandidate,
        vector: Vec<f32>,
        user_id: &str,
        metadata_override: Option<HashMap<String, serde_json::Value>>,
    ) -> Result<MemoryId> {
        let id = MemoryId::new();
        let now = Utc::now();
        let mut metadata = metadata_override.unwrap_or_default();
        metadata
            .entry("type".to_string())
            .or_insert_with(|| serde_json::Value::String(fact.memory_type.as_str().to_string()));
        metadata
            .entry("date".to_string())
            .or_insert_with(|| serde_json::Value::String(now.format("%Y-%m-%d").to_string()));

        self.store.insert(&[NewMemoryRow {
            id,
            memory: fact.memory.clone(),
            chunk: fact.chunk.clone().unwrap_or_default(),
            user_id: user_id.to_string(),
            vector,
            metadata,
            memory_type: fact.memory_type,
            hash: compute_hash(&fact.memory),
            superseded_by: None,
            created_at: now,
            updated_at: now,
        }])?;
        Ok(id)
    }

    /// Enforces the two type-specific aging rules after a fresh insert.
    async fn apply_type_uniqueness(
        &self,
        memory_type: MemoryType,
        new_id: MemoryId,
        user_id: &str,
    ) -> Result<()> {
        match memory_type {
            MemoryType::Progress => self.enforce_progress_singleton(new_id, user_id),
            MemoryType::SessionSummary => self.compress_session_summaries_if_needed(user_id).await,
            _ => Ok(()),
        }
    }

    fn enforce_progress_singleton(&self, new_id: MemoryId, user_id: &str) -> Result<()> {
        let active = self.store.scan(user_id, &ScanOptions::default())?;
        let now = Utc::now();
        for row in active {
            if row.memory_type == MemoryType::Progress && row.id != new_id {
                self.store.update(
                    row.id,
                    &MemoryPatch {
                        superseded_by: Some(Some(new_id)),
                        updated_at: Some(now),
                        ..Default::default()
                    },
                )?;
            }
        }
        Ok(())
    }

    async fn compress_session_summaries_if_needed(&self, user_id: &str) -> Result<()> {
        let mut active: Vec<_> = self
            .store
            .scan(user_id, &ScanOptions::default())?
            .into_iter()
            .filter(|r| r.memory_type == MemoryType::SessionSummary)
            .collect();
        if active.len() <= SESSION_SUMMARY_CAP {
            return Ok(());
        }
        active.sort_by_key(|r| r.created_at);
        let oldest = active.remove(0);

        let compressed = self
            .extractor
            .extract(
                &[crate::types::Message {
                    role: "system".to_string(),
                    content: oldest.chunk.clone(),
                }],
                ExtractMode::Summary,
            )
            .await
            .unwrap_or_default();

        for fact in compressed {
            let pattern = FactCandidate {
                memory: fact.memory,
                memory_type: MemoryType::LearnedPattern,
                chunk: fact.chunk,
            };
            let vector = self.embedder.embed(&pattern.memory, EmbedRole::Document).await?;
            self.insert_fresh(&pattern, vector, user_id, None)?;
        }

        self.store.delete(&oldest.id.to_crockford())?;
        Ok(())
    }
}
