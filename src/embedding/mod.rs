//! Embedder capability: maps text to a unit-norm vector of fixed
//! dimension, distinguishing `document` and `query` input roles. A
//! reqwest JSON client behind an `EmbedderCapability` trait, with Voyage
//! AI as the concrete vendor.

use async_trait::async_trait;

use crate::config::Config;
use crate::error::{CodexfiError, Result};
use crate::retry::{classify_status, with_backoff, with_timeout, RetryPolicy, UpstreamOutcome};
use crate::types::EmbedRole;

/// Vendor-specific character cap applied before every embed call.
const DEFAULT_CHAR_CAP: usize = 30_000;

/// Abstract embedder capability the engine depends on.
#[async_trait]
pub trait EmbedderCapability: Send + Sync {
    /// Embeds `text` under the given role. Output is assumed L2-normalized.
    async fn embed(&self, text: &str, role: EmbedRole) -> Result<Vec<f32>>;

    /// Output vector dimensionality.
    fn dimensions(&self) -> usize;
}

/// Voyage AI embedding client (`VOYAGE_API_KEY`).
pub struct VoyageEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dimensions: usize,
    char_cap: usize,
    timeout: std::time::Duration,
}

impl VoyageEmbedder {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.voyage_api_key.clone(),
            model: "voyage-3".to_string(),
            dimensions: config.embedding_dims,
            char_cap: DEFAULT_CHAR_CAP,
            timeout: std::time::Duration::from_secs(30),
        }
    }

    fn role_str(role: EmbedRole) -> &'static str {
        match role {
            EmbedRole::Document => "document",
            EmbedRole::Query => "query",
        }
    }

    async fn call_once(&self, text: &str, role: EmbedRole) -> Result<Vec<f32>> {
        let response = self
            .client
            .post("https://api.voyageai.com/v1/embeddings")
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "input": [text],
                "model": self.model,
                "input_type": Self::role_str(role),
            }))
            .send()
            .await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CodexfiError::Upstream {
                provider: "voyage".to_string(),
                message: format!("{status}: {body}"),
                retryable: classify_status(status) == UpstreamOutcome::Retryable,
            });
        }

        let data: serde_json::Value = response.json().await?;
        let embedding: Vec<f32> = data["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| CodexfiError::Upstream {
                provider: "voyage".to_string(),
                message: "missing embedding field in response".to_string(),
                retryable: false,
            })?
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect();

        Ok(normalize(embedding))
    }
}

#[async_trait]
impl EmbedderCapability for VoyageEmbedder {
    async fn embed(&self, text: &str, role: EmbedRole) -> Result<Vec<f32>> {
        let truncated = truncate_chars(text, self.char_cap);
        let policy = RetryPolicy::default();
        with_timeout(self.timeout, with_backoff(&policy, || self.call_once(&truncated, role))).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

fn truncate_chars(text: &str, cap: usize) -> String {
    if text.chars().count() <= cap {
        text.to_string()
    } else {
        text.chars().take(cap).collect()
    }
}

/// L2-normalizes a vector; an all-zero vector is returned unchanged.
pub fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut vector {
            *x /= norm;
        }
    }
    vector
}
