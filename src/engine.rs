//! The engine: a single long-lived value wiring config, store, and the
//! two capability clients together, rather than scattering them across
//! global singletons.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;

use crate::config::Config;
use crate::dedup::DedupEngine;
use crate::embedding::{EmbedderCapability, VoyageEmbedder};
use crate::error::Result;
use crate::extraction::{create_extractor, ExtractorCapability};
use crate::id::MemoryId;
use crate::ingest::IngestPipeline;
use crate::lifecycle::LifecycleOps;
use crate::retrieval::RetrievalPipeline;
use crate::store::VectorStore;
use crate::types::{IngestEvent, IngestOptions, ListOptions, MemoryRow, Message, SearchOptions, SearchResult};

/// Single entry point for the memory engine. Cheap to clone: every field
/// is already `Arc`-backed or internally reference-counted.
#[derive(Clone)]
pub struct Engine {
    ingest: Arc<IngestPipeline>,
    retrieval: Arc<RetrievalPipeline>,
    lifecycle: Arc<LifecycleOps>,
    scope_locks: Arc<DashMap<String, Arc<AsyncMutex<()>>>>,
}

impl Engine {
    /// Builds an engine from config, wiring `VoyageEmbedder` and the
    /// extraction vendor named by `config.extraction_provider`.
    pub fn new(config: &Config) -> Result<Self> {
        let store = VectorStore::open(&config.store_dir(), config.embedding_dims)?;
        let embedder: Arc<dyn EmbedderCapability> = Arc::new(VoyageEmbedder::new(config));
        let extractor: Arc<dyn ExtractorCapability> = create_extractor(config)?.into();
        Self::with_capabilities(config, store, embedder, extractor)
    }

    /// Builds an engine from explicit capability implementations, used by
    /// tests to swap in deterministic fakes.
    pub fn with_capabilities(
        config: &Config,
        store: VectorStore,
        embedder: Arc<dyn EmbedderCapability>,
        extractor: Arc<dyn ExtractorCapability>,
    ) -> Result<Self> {
        let dedup = DedupEngine::new(
            store.clone(),
            embedder.clone(),
            extractor.clone(),
            config.search_defaults.near_duplicate_cosine,
        );
        let ingest = IngestPipeline::new(embedder.clone(), extractor, dedup);
        let retrieval = RetrievalPipeline::new(
            store.clone(),
            embedder,
            config.search_defaults.enumeration_base_score,
        );
        let lifecycle = LifecycleOps::new(store);

        Ok(Self {
            ingest: Arc::new(ingest),
            retrieval: Arc::new(retrieval),
            lifecycle: Arc::new(lifecycle),
            scope_locks: Arc::new(DashMap::new()),
        })
    }

    fn lock_for(&self, user_id: &str) -> Arc<AsyncMutex<()>> {
        self.scope_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Ingests `messages` into `user_id`'s scope. Serialized per scope: a
    /// second concurrent call for the same `user_id` waits; different
    /// scopes proceed in parallel.
    pub async fn ingest(
        &self,
        messages: &[Message],
        user_id: &str,
        options: &IngestOptions,
    ) -> Result<Vec<IngestEvent>> {
        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;
        self.ingest.ingest(messages, user_id, options).await
    }

    /// Searches `user_id`'s scope. Never takes the scope mutex; reads a
    /// `refresh()`-ed snapshot instead.
    pub async fn search(
        &self,
        query: &str,
        user_id: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        self.retrieval.search(query, user_id, options).await
    }

    pub fn list(&self, user_id: &str, options: &ListOptions) -> Result<Vec<MemoryRow>> {
        self.lifecycle.list(user_id, options)
    }

    pub fn profile(&self, user_id: &str, n: usize) -> Result<Vec<MemoryRow>> {
        self.lifecycle.profile(user_id, n)
    }

    pub fn delete(&self, id: MemoryId) -> Result<()> {
        self.lifecycle.delete(id)
    }

    pub fn cleanup(&self, user_id: &str) -> Result<usize> {
        self.lifecycle.cleanup(user_id)
    }
}
