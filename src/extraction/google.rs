//! Google generative-language API extractor client.

use async_trait::async_trait;

use super::anthropic::join_transcript;
use super::{parse_facts, system_prompt, ExtractorCapability};
use crate::config::Config;
use crate::error::{CodexfiError, Result};
use crate::retry::{classify_status, with_backoff, with_timeout, RetryPolicy, UpstreamOutcome};
use crate::types::{ExtractMode, FactCandidate, Message};

const EXTRACT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

pub struct GoogleExtractor {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GoogleExtractor {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config
            .google_api_key
            .clone()
            .ok_or_else(|| CodexfiError::Config("GOOGLE_API_KEY is required".to_string()))?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: "gemini-2.5-flash".to_string(),
        })
    }

    async fn call_once(&self, transcript: &str, mode: ExtractMode) -> Result<String> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "system_instruction": {"parts": [{"text": system_prompt(mode)}]},
                "contents": [{"parts": [{"text": transcript}]}],
            }))
            .send()
            .await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CodexfiError::Upstream {
                provider: "google".to_string(),
                message: format!("{status}: {body}"),
                retryable: classify_status(status) == UpstreamOutcome::Retryable,
            });
        }

        let data: serde_json::Value = response.json().await?;
        let text = data["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        Ok(text)
    }
}

#[async_trait]
impl ExtractorCapability for GoogleExtractor {
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
