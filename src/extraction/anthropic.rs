//! Anthropic Messages API extractor client.

use async_trait::async_trait;

use super::{parse_facts, system_prompt, ExtractorCapability};
use crate::config::Config;
use crate::error::{CodexfiError, Result};
use crate::retry::{classify_status, with_backoff, with_timeout, RetryPolicy, UpstreamOutcome};
use crate::types::{ExtractMode, FactCandidate, Message};

const EXTRACT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

pub struct AnthropicExtractor {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl AnthropicExtractor {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config
            .anthropic_api_key
            .clone()
            .ok_or_else(|| CodexfiError::Config("ANTHROPIC_API_KEY is required".to_string()))?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: "claude-haiku-4-5".to_string(),
        })
    }

    async fn call_once(&self, transcript: &str, mode: ExtractMode) -> Result<String> {
        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&serde_json::json!({
                "model": self.model,
                "max_tokens": 1024,
                "system": system_prompt(mode),
                "messages": [{"role": "user", "content": transcript}],
            }))
            .send()
            .await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CodexfiError::Upstream {
                provider: "anthropic".to_string(),
                message: format!("{status}: {body}"),
                retryable: classify_status(status) == UpstreamOutcome::Retryable,
            });
        }

        let data: serde_json::Value = response.json().await?;
        let text = data["content"][0]["text"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        Ok(text)
    }
}

#[async_trait]
impl ExtractorCapability for AnthropicExtractor {
    async fn extract(&self, messages: &[Message], mode: ExtractMode) -> Result<Vec<FactCandidate>> {
        let transcript = join_transcript(messages);
        let policy = RetryPolicy::default();
        let raw = with_timeout(
            EXTRACT_TIMEOUT,
            with_backoff(&policy, || self.call_once(&transcript, mode)),
        )
        .await?;
        Ok(parse_facts(&raw))
    }
}

pub(crate) fn join_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}
