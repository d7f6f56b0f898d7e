//! Ingestion pipeline: privacy-strip, extract, embed, dedup/version,
//! commit. Runs synchronously per call rather than through a background
//! queue.

use std::sync::Arc;

use crate::dedup::DedupEngine;
use crate::embedding::EmbedderCapability;
use crate::error::Result;
use crate::extraction::ExtractorCapability;
use crate::privacy::{is_fully_private, strip_private};
use crate::types::{EmbedRole, ExtractMode, IngestEvent, IngestOptions, Message};

pub struct IngestPipeline {
    embedder: Arc<dyn EmbedderCapability>,
    extractor: Arc<dyn ExtractorCapability>,
    dedup: DedupEngine,
}

impl IngestPipeline {
    pub fn new(
        embedder: Arc<dyn EmbedderCapability>,
        extractor: Arc<dyn ExtractorCapability>,
        dedup: DedupEngine,
    ) -> Self {
        Self {
            embedder,
            extractor,
            dedup,
        }
    }

    pub async fn ingest(
        &self,
        messages: &[Message],
        user_id: &str,
        options: &IngestOptions,
    ) -> Result<Vec<IngestEvent>> {
        let stripped: Vec<Message> = messages
            .iter()
            .map(|m| Message {
                role: m.role.clone(),
                content: strip_private(&m.content),
            })
            .filter(|m| !is_fully_private(&m.content))
            .collect();

        let mode = options.mode.unwrap_or(ExtractMode::Normal);
        let facts = self.extractor.extract(&stripped, mode).await?;

        let mut events = Vec::with_capacity(facts.len());
        for mut fact in facts {
            if fact.memory.trim().is_empty() || is_fully_private(&fact.memory) {
                continue;
            }
            fact.memory = strip_private(&fact.memory).trim().to_string();
            if let Some(chunk) = &fact.chunk {
                let stripped_chunk = strip_private(chunk);
                fact.chunk = if is_fully_private(&stripped_chunk) {
                    None
                } else {
                    Some(stripped_chunk)
                };
            }
            if fact.memory.is_empty() {
                continue;
            }

            let vector = match self.embedder.embed(&fact.memory, EmbedRole::Document).await {
                Ok(v) => v,
                Err(err) => {
                    tracing::warn!(error = %err, "embed failed for one fact; skipping it");
                    continue;
                }
            };

            let event = self.dedup.process(&fact, vector, user_id).await?;
            events.push(event);
        }

        Ok(events)
    }
}
