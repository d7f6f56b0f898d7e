//! Property and invariant tests (P1-P8).
//!
//! Pure functions (hashing, normalization, privacy stripping, vector
//! normalization) are checked with `proptest` across arbitrary inputs.
//! Invariants that require a running engine (scope isolation, supersede
//! exclusion, progress singleton, dedup idempotence, knowledge-update
//! ranking) are checked with concrete scenarios against an in-memory
//! store and deterministic fakes, since driving an async engine through
//! proptest's synchronous generators adds little beyond what a few
//! well-chosen cases already cover.

use std::sync::Arc;

use proptest::prelude::*;

use codexfi::config::Config;
use codexfi::dedup::{compute_hash, normalize_memory};
use codexfi::embedding::normalize;
use codexfi::engine::Engine;
use codexfi::privacy::strip_private;
use codexfi::store::VectorStore;
use codexfi::testing::{FakeEmbedder, FakeExtractor};
use codexfi::types::{FactCandidate, IngestEvent, IngestOptions, ListOptions, Message, MemoryType, SearchOptions};

const DIMS: usize = 32;

fn user(content: &str) -> Message {
    Message {
        role: "user".to_string(),
        content: content.to_string(),
    }
}

fn fact(memory: &str, memory_type: MemoryType) -> FactCandidate {
    FactCandidate {
        memory: memory.to_string(),
        memory_type,
        chunk: None,
    }
}

fn engine_with(facts: Vec<Vec<FactCandidate>>) -> Engine {
    let config = Config::for_tests(std::env::temp_dir().join("codexfi-props"));
    let store = VectorStore::open_in_memory(DIMS).unwrap();
    let embedder = Arc::new(FakeEmbedder::new(DIMS));
    let extractor = Arc::new(FakeExtractor::new(facts));
    Engine::with_capabilities(&config, store, embedder, extractor).unwrap()
}

proptest! {
    // P2 (partial, pure slice): normalization never panics and is stable
    // under re-application.
    #[test]
    fn normalize_memory_is_idempotent(s in ".{0,200}") {
        let once = normalize_memory(&s);
        let twice = normalize_memory(&once);
        prop_assert_eq!(once, twice);
    }

    // P3 support: hash is a pure function of normalized text.
    #[test]
    fn hash_matches_for_equivalent_whitespace_and_case(s in "[A-Za-z0-9 ]{1,80}") {
        let upper = s.to_uppercase();
        prop_assert_eq!(compute_hash(&s), compute_hash(&upper));
    }

    // P4: any vector normalize() produces is unit-length (or exactly zero
    // for an all-zero input).
    #[test]
    fn normalize_produces_unit_or_zero_vectors(v in prop::collection::vec(-100.0f32..100.0, 1..16)) {
        let normalized = normalize(v);
        let norm: f32 = normalized.iter().map(|x| x * x).sum::<f32>().sqrt();
        prop_assert!(norm < 1e-5 || (norm - 1.0).abs() < 1e-4);
    }

    // P8: text matched by <private>...</private> never survives stripping.
    #[test]
    fn private_spans_never_survive_stripping(secret in "[a-zA-Z0-9]{1,30}", prefix in "[a-zA-Z ]{0,20}", suffix in "[a-zA-Z ]{0,20}") {
        let input = format!("{prefix}<private>{secret}</private>{suffix}");
        let stripped = strip_private(&input);
        prop_assert!(!stripped.contains(&secret));
    }

    #[test]
    fn strip_private_never_panics(s in ".{0,300}") {
        let _ = strip_private(&s);
    }
}

#[tokio::test]
async fn p1_scope_isolation() {
    let engine = engine_with(vec![
        vec![fact("auth uses JWT", MemoryType::TechContext)],
        vec![fact("auth uses sessions", MemoryType::TechContext)],
    ]);
    engine.ingest(&[user("a")], "scope-a", &IngestOptions::default()).await.unwrap();
    engine.ingest(&[user("b")], "scope-b", &IngestOptions::default()).await.unwrap();

    let results = engine
        .search("auth", "scope-a", &SearchOptions { threshold: 0.0, ..Default::default() })
        .await
        .unwrap();
    let a_ids: Vec<_> = engine.list("scope-a", &ListOptions::default()).unwrap().into_iter().map(|r| r.id).collect();
    for r in results {
        assert!(a_ids.contains(&r.id));
    }
}

#[tokio::test]
async fn p2_superseded_rows_excluded_from_search() {
    let engine = engine_with(vec![
        vec![fact("we use sqlalchemy as orm", MemoryType::Preference)],
        vec![fact("we use sqlalchemy as orm", MemoryType::Preference)],
    ]);
    engine.ingest(&[user("a")], "test", &IngestOptions::default()).await.unwrap();
    let events = engine.ingest(&[user("a")], "test", &IngestOptions::default()).await.unwrap();
    // Exact re-ingest is an in-place update (Step 1), not a supersede, so
    // assert the general invariant against whatever superseded rows exist.
    let _ = events;

    let results = engine
        .search("sqlalchemy", "test", &SearchOptions { threshold: 0.0, ..Default::default() })
        .await
        .unwrap();
    let all = engine.list("test", &ListOptions { include_superseded: true, limit: None }).unwrap();
    let superseded_ids: Vec<_> = all.iter().filter(|r| r.superseded_by.is_some()).map(|r| r.id).collect();
    for r in results {
        assert!(!superseded_ids.contains(&r.id));
    }
}

#[tokio::test]
async fn p5_progress_singleton() {
    let engine = engine_with(vec![
        vec![fact("milestone one complete", MemoryType::Progress)],
        vec![fact("milestone two complete", MemoryType::Progress)],
        vec![fact("milestone three complete", MemoryType::Progress)],
    ]);
    for i in 0..3 {
        engine.ingest(&[user(&format!("update {i}"))], "test", &IngestOptions::default()).await.unwrap();
    }
    let active = engine.list("test", &ListOptions::default()).unwrap();
    let progress_count = active.iter().filter(|r| r.memory_type == MemoryType::Progress).count();
    assert!(progress_count <= 1);
}

#[tokio::test]
async fn p6_dedup_idempotence() {
    let the_fact = fact("we use rust for the backend", MemoryType::TechContext);
    let engine = engine_with(vec![vec![the_fact.clone()], vec![the_fact]]);

    engine.ingest(&[user("a")], "test", &IngestOptions::default()).await.unwrap();
    let before = engine.list("test", &ListOptions::default()).unwrap().len();

    let events = engine.ingest(&[user("a")], "test", &IngestOptions::default()).await.unwrap();
    assert!(events.iter().all(|e| matches!(e, IngestEvent::Update { .. })));

    let after = engine.list("test", &ListOptions::default()).unwrap().len();
    assert_eq!(before, after);
}

#[tokio::test]
async fn p7_knowledge_update_chain_excludes_old_row() {
    use codexfi::testing::ScriptedEmbedder;

    let config = Config::for_tests(std::env::temp_dir().join("codexfi-props-p7"));
    let store = VectorStore::open_in_memory(2).unwrap();
    let embedder = Arc::new(ScriptedEmbedder::new(vec![
        vec![1.0, 0.01],
        vec![1.0, 0.0],
        vec![0.99, 0.01],
    ]));
    let extractor = Arc::new(FakeExtractor::new(vec![
        vec![fact("preferred editor is vim", MemoryType::Preference)],
        vec![fact("preferred editor is now neovim", MemoryType::Preference)],
    ]));
    let engine = Engine::with_capabilities(&config, store, embedder, extractor).unwrap();

    engine.ingest(&[user("a")], "test", &IngestOptions::default()).await.unwrap();
    engine.ingest(&[user("b")], "test", &IngestOptions::default()).await.unwrap();

    let results = engine
        .search("editor preference", "test", &SearchOptions { threshold: 0.0, ..Default::default() })
        .await
        .unwrap();

    assert!(results[0].memory.contains("neovim"));
    assert!(!results.iter().any(|r| r.memory.contains("is vim")));
}
