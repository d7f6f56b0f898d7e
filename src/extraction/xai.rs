//! xAI chat-completions extractor client.

use async_trait::async_trait;

use super::anthropic::join_transcript;
use super::{parse_facts, system_prompt, ExtractorCapability};
use crate::config::Config;
use crate::error::{CodexfiError, Result};
use crate::retry::{classify_status, with_backoff, with_timeout, RetryPolicy, UpstreamOutcome};
use crate::types::{ExtractMode, FactCandidate, Message};

const EXTRACT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

pub struct XaiExtractor {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl XaiExtractor {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config
            .xai_api_key
            .clone()
            .ok_or_else(|| CodexfiError::Config("XAI_API_KEY is required".to_string()))?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: "grok-4-fast".to_string(),
        })
    }

    async fn call_once(&self, transcript: &str, mode: ExtractMode) -> Result<String> {
        let response = self
            .client
            .post("https://api.x.ai/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "messages": [
                    {"role": "system", "content": system_prompt(mode)},
                    {"role": "user", "content": transcript},
                ],
            }))
            .send()
            .await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CodexfiError::Upstream {
                provider: "xai".to_string(),
                message: format!("{status}: {body}"),
                retryable: classify_status(status) == UpstreamOutcome::Retryable,
            });
        }

        let data: serde_json::Value = response.json().await?;
        let text = data["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        Ok(text)
    }
}

#[async_trait]
impl ExtractorCapability for XaiExtractor {
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
