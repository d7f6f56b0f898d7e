//! Deterministic test doubles for the two capability traits, used by
//! integration tests so they don't depend on network access.
//!
//! The fake embedder hashes each whitespace token into a fixed-width
//! vector, then L2-normalizes. This gives sentences that share tokens a
//! higher cosine score than unrelated ones, without any network call.

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use crate::embedding::{normalize, EmbedderCapability};
use crate::error::Result;
use crate::extraction::ExtractorCapability;
use crate::types::{EmbedRole, ExtractMode, FactCandidate, Message};

pub struct FakeEmbedder {
    dims: usize,
}

impl FakeEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

#[async_trait]
impl EmbedderCapability for FakeEmbedder {
    async fn embed(&self, text: &str, _role: EmbedRole) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dims];
        for token in text.to_ascii_lowercase().split_whitespace() {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let bucket = (hasher.finish() as usize) % self.dims;
            vector[bucket] += 1.0;
        }
        Ok(normalize(vector))
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

/// Returns vectors from a fixed queue in order, looping once exhausted.
/// Lets a test pin exact cosine relationships between facts that a
/// content-derived embedder cannot guarantee.
pub struct ScriptedEmbedder {
    vectors: Mutex<Vec<Vec<f32>>>,
    cursor: Mutex<usize>,
}

impl ScriptedEmbedder {
    pub fn new(vectors: Vec<Vec<f32>>) -> Self {
        Self {
            vectors: Mutex::new(vectors),
            cursor: Mutex::new(0),
        }
    }
}

#[async_trait]
impl EmbedderCapability for ScriptedEmbedder {
    async fn embed(&self, _text: &str, _role: EmbedRole) -> Result<Vec<f32>> {
        let vectors = self.vectors.lock().unwrap();
        let mut cursor = self.cursor.lock().unwrap();
        let vector = vectors[*cursor % vectors.len()].clone();
        *cursor += 1;
        Ok(normalize(vector))
    }

    fn dimensions(&self) -> usize {
        self.vectors.lock().unwrap()[0].len()
    }
}

/// Scripted extractor: returns a fixed queue of responses in order,
/// falling back to an empty result once the queue is drained. Lets a test
/// stage exactly which facts each `ingest` call should see.
pub struct FakeExtractor {
    queue: Mutex<std::collections::VecDeque<Vec<FactCandidate>>>,
}

impl FakeExtractor {
    pub fn new(responses: Vec<Vec<FactCandidate>>) -> Self {
        Self {
            queue: Mutex::new(responses.into()),
        }
    }
}

#[async_trait]
impl ExtractorCapability for FakeExtractor {
    async fn extract(&self, _messages: &[Message], _mode: ExtractMode) -> Result<Vec<FactCandidate>> {
        Ok(self.queue.lock().unwrap().pop_front().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_embedder_is_deterministic() {
        let embedder = FakeEmbedder::new(16);
        let a = embedder.embed("we use postgresql", EmbedRole::Document).await.unwrap();
        let b = embedder.embed("we use postgresql", EmbedRole::Document).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn fake_embedder_distinguishes_unrelated_text() {
        let embedder = FakeEmbedder::new(64);
        let a = embedder.embed("we use postgresql as our database", EmbedRole::Document).await.unwrap();
        let b = embedder.embed("the sky is blue today", EmbedRole::Document).await.unwrap();
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        assert!(dot < 0.9);
    }
}
