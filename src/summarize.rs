//! Document summarization via a generative chat-completion call.
//!
//! The summarizer condenses extracted text into a short synopsis shown on
//! the document dashboard and handed to the chat collaborator alongside the
//! content. It is the one pipeline stage that is allowed to fail without
//! failing the file: the pipeline stores [`SUMMARY_UNAVAILABLE`] instead.

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::SummaryConfig;
use crate::upstream::{self, UpstreamError};

/// Sentinel stored when the generative call fails after exhausting retries.
pub const SUMMARY_UNAVAILABLE: &str = "summary unavailable";

/// Capability trait for producing a short synopsis of a document.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String, UpstreamError>;
}

/// A summarizer that always fails, for deployments without a generative
/// provider. Every ingested document gets the sentinel summary.
pub struct DisabledSummarizer;

#[async_trait]
impl Summarizer for DisabledSummarizer {
    async fn summarize(&self, _text: &str) -> Result<String, UpstreamError> {
        Err(UpstreamError::Fatal(
            "summary provider is disabled".to_string(),
        ))
    }
}

/// Summarizer backed by the OpenAI chat-completions API.
///
/// Requires the `OPENAI_API_KEY` environment variable to be set. Oversized
/// input is truncated before the call so summarization degrades gracefully
/// instead of the request being rejected outright.
pub struct OpenAiSummarizer {
    model: String,
    max_input_chars: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAiSummarizer {
    pub fn new(config: &SummaryConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("summary.model required for OpenAI provider"))?;

        if std::env::var("OPENAI_API_KEY").is_err() {
            bail!("OPENAI_API_KEY environment variable not set");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            max_input_chars: config.max_input_chars,
            max_retries: config.max_retries,
            client,
        })
    }

    async fn request(&self, input: &str) -> Result<String, UpstreamError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| UpstreamError::Fatal("OPENAI_API_KEY not set".to_string()))?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": format!(
                    "Write a concise summary (2-3 sentences) of the following document content:\n\n{}",
                    input
                ),
            }],
        });

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(UpstreamError::from_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(UpstreamError::from_status(status, body_text));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| UpstreamError::Fatal(format!("invalid completion response: {}", e)))?;

        json.get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|choice| choice.pointer("/message/content"))
            .and_then(|c| c.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| {
                UpstreamError::Fatal(
                    "invalid completion response: missing choices[0].message.content".to_string(),
                )
            })
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(&self, text: &str) -> Result<String, UpstreamError> {
        let input = truncate_chars(text, self.max_input_chars);

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.request(input).await {
                Ok(summary) => return Ok(summary),
                Err(err) => {
                    if !upstream::should_retry(&err, attempts, self.max_retries) {
                        return Err(upstream::exhausted(err, attempts));
                    }
                    tokio::time::sleep(upstream::backoff_delay(attempts)).await;
                }
            }
        }
    }
}

/// Create the appropriate [`Summarizer`] based on configuration.
pub fn create_summarizer(config: &SummaryConfig) -> Result<std::sync::Arc<dyn Summarizer>> {
    match config.provider.as_str() {
        "disabled" => Ok(std::sync::Arc::new(DisabledSummarizer)),
        "openai" => Ok(std::sync::Arc::new(OpenAiSummarizer::new(config)?)),
        other => bail!("Unknown summary provider: {}", other),
    }
}

/// Truncate to at most `max_chars` characters without splitting a `char`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
