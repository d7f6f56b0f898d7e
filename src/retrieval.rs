//! Retrieval pipeline: privacy-strip query, embed, vector phase,
//! enumeration union, recency blend, truncate. A two-source union (vector
//! search plus a type-filtered scan) with no lexical/fuzzy/rerank stages.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use crate::embedding::EmbedderCapability;
use crate::error::Result;
use crate::id::MemoryId;
use crate::privacy::{is_fully_private, strip_private};
use crate::store::VectorStore;
use crate::types::{EmbedRole, MemoryRow, ScanOptions, SearchOptions, SearchResult};

pub struct RetrievalPipeline {
    store: VectorStore,
    embedder: Arc<dyn EmbedderCapability>,
    enumeration_base_score: f32,
}

impl RetrievalPipeline {
    pub fn new(store: VectorStore, embedder: Arc<dyn EmbedderCapability>, enumeration_base_score: f32) -> Self {
        Self {
            store,
            embedder,
            enumeration_base_score,
        }
    }

    pub async fn search(
        &self,
        query: &str,
        user_id: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        let stripped = strip_private(query);
        if stripped.trim().is_empty() || is_fully_private(&stripped) {
            return Ok(Vec::new());
        }

        self.store.refresh()?;

        let vector = self.embedder.embed(&stripped, EmbedRole::Query).await?;

        let vector_hits = self
            .store
            .search_by_vector(&vector, user_id, options.limit, options.threshold)?;

        let mut scored: HashMap<MemoryId, (MemoryRow, f32)> = HashMap::new();
        for hit in vector_hits {
            scored.insert(hit.row.id, (hit.row, hit.score));
        }

        if let Some(types) = &options.types {
            if !types.is_empty() {
                let enumeration_limit = options.limit.max(60);
                let scanned = self.store.scan(
                    user_id,
                    &ScanOptions {
                        include_superseded: false,
                        limit: None,
                    },
                )?;
                for row in scanned {
                    if !types.contains(&row.memory_type) {
                        continue;
                    }
                    scored.entry(row.id).or_insert((row, self.enumeration_base_score));
                    if scored.len() >= enumeration_limit {
                        break;
                    }
                }
            }
        }

        let today = Utc::now().date_naive();
        let mut results: Vec<(MemoryRow, f32)> = scored
            .into_values()
            .map(|(row, cosine)| {
                let final_score = if options.recency_weight > 0.0 {
                    let age_days = row
                        .metadata_date()
                        .map(|d| (today - d).num_days().clamp(0, 365) as f32)
                        .unwrap_or(365.0);
                    let recency = 1.0 - age_days / 365.0;
                    (1.0 - options.recency_weight) * cosine + options.recency_weight * recency
                } else {
                    cosine
                };
                (row, final_score)
            })
            .filter(|(row, _)| row.is_active())
            .collect();

        results.sort_by(|(row_a, score_a), (row_b, score_b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| row_b.updated_at.cmp(&row_a.updated_at))
                .then_with(|| row_b.id.cmp(&row_a.id))
        });
        results.truncate(options.limit);

        Ok(results
            .into_iter()
            .map(|(row, score)| SearchResult {
                id: row.id,
                memory: row.memory,
                chunk: row.chunk,
                score: score.clamp(0.0, 1.0),
                date: row
                    .metadata
                    .get("date")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string()),
                metadata: row.metadata,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeEmbedder, ScriptedEmbedder};
    use crate::types::SearchOptions;

    #[tokio::test]
    async fn fully_private_query_short_circuits_without_embedding() {
        let store = VectorStore::open_in_memory(4).unwrap();
        let pipeline = RetrievalPipeline::new(store, Arc::new(FakeEmbedder::new(4)), 0.35);
        let results = pipeline
            .search("<private>only secret</private>", "u1", &SearchOptions::default())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn enumeration_union_assigns_base_score_to_type_matches() {
        use crate::types::{MemoryType, NewMemoryRow};
        use chrono::Utc;
        use std::collections::HashMap;

        let store = VectorStore::open_in_memory(2).unwrap();
        let now = Utc::now();
        store
            .insert(&[NewMemoryRow {
                id: MemoryId::new(),
                memory: "unrelated to the query vector".to_string(),
                chunk: String::new(),
                user_id: "u1".to_string(),
                vector: vec![0.0, 1.0],
                metadata: HashMap::new(),
                memory_type: MemoryType::TechContext,
                hash: crate::dedup::compute_hash("unrelated to the query vector"),
                superseded_by: None,
                created_at: now,
                updated_at: now,
            }])
            .unwrap();

        let embedder = Arc::new(ScriptedEmbedder::new(vec![vec![1.0, 0.0]]));
        let pipeline = RetrievalPipeline::new(store, embedder, 0.35);
        let results = pipeline
            .search(
                "query",
                "u1",
                &SearchOptions {
                    threshold: 0.9,
                    types: Some(vec![MemoryType::TechContext]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score, 0.35);
    }
}
