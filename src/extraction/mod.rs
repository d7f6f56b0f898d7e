//! Extractor capability: turns a list of messages plus a mode into typed
//! fact candidates, by calling out to an LLM and defensively parsing its
//! JSON response. A vendor-agnostic trait with one HTTP client per
//! provider selected by `EXTRACTION_PROVIDER`.

mod anthropic;
mod google;
mod xai;

pub use anthropic::AnthropicExtractor;
pub use google::GoogleExtractor;
pub use xai::XaiExtractor;

use async_trait::async_trait;

use crate::config::{Config, ExtractionProvider};
use crate::error::Result;
use crate::types::{ExtractMode, FactCandidate, Message};

/// Abstract extractor capability the engine depends on. The engine treats
/// the extractor as best-effort: an empty result is valid, and
/// schema-violating entries are dropped rather than failing the call.
#[async_trait]
pub trait ExtractorCapability: Send + Sync {
    async fn extract(&self, messages: &[Message], mode: ExtractMode) -> Result<Vec<FactCandidate>>;
}

/// Builds the extractor named by `config.extraction_provider`.
pub fn create_extractor(config: &Config) -> Result<Box<dyn ExtractorCapability>> {
    match config.extraction_provider {
        ExtractionProvider::Anthropic => Ok(Box::new(AnthropicExtractor::new(config)?)),
        ExtractionProvider::Xai => Ok(Box::new(XaiExtractor::new(config)?)),
        ExtractionProvider::Google => Ok(Box::new(GoogleExtractor::new(config)?)),
    }
}

/// Shared prompt used by every vendor implementation, varied only by
/// `mode`. Kept here so the three clients cannot drift apart.
pub(crate) fn system_prompt(mode: ExtractMode) -> &'static str {
    match mode {
        ExtractMode::Normal => {
            "Extract durable facts from this conversation as a JSON array of \
             {memory, type, chunk?} objects. Only include facts worth \
             remembering across sessions."
        }
        ExtractMode::Summary => {
            "Compress this transcript into a small number of durable facts as \
             a JSON array of {memory, type, chunk?} objects."
        }
        ExtractMode::Init => {
            "Extract project-brief facts (stack, architecture, conventions) \
             from this document as a JSON array of {memory, type, chunk?} \
             objects."
        }
    }
}

/// Parses a vendor's raw JSON text response into fact candidates,
/// dropping invalid JSON or schema-violating entries with a warning
/// rather than failing the whole extraction.
pub(crate) fn parse_facts(raw: &str) -> Vec<FactCandidate> {
    let trimmed = extract_json_array(raw);
    let parsed: serde_json::Value = match serde_json::from_str(trimmed) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "extractor returned invalid JSON; dropping result");
            return Vec::new();
        }
    };

    let Some(array) = parsed.as_array() else {
        tracing::warn!("extractor response was not a JSON array; dropping result");
        return Vec::new();
    };

    array
        .iter()
        .filter_map(|entry| match serde_json::from_value::<RawFact>(entry.clone()) {
            Ok(raw_fact) if !raw_fact.memory.trim().is_empty() => Some(FactCandidate {
                memory: raw_fact.memory,
                memory_type: crate::types::MemoryType::parse_or_conversation(&raw_fact.memory_type),
                chunk: raw_fact.chunk,
            }),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "dropping schema-violating fact entry");
                None
            }
        })
        .collect()
}

#[derive(serde::Deserialize)]
struct RawFact {
    memory: String,
    #[serde(rename = "type", default = "default_type")]
    memory_type: String,
    #[serde(default)]
    chunk: Option<String>,
}

fn default_type() -> String {
    "conversation".to_string()
}

/// Extractors sometimes wrap the JSON array in prose or a markdown code
/// fence; this pulls out the first top-level `[...]` span.
fn extract_json_array(raw: &str) -> &str {
    let start = raw.find('[');
    let end = raw.rfind(']');
    match (start, end) {
        (Some(s), Some(e)) if e >= s => &raw[s..=e],
        _ => raw,
    }
}
