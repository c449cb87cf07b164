//! Generation collaborator abstraction.
//!
//! The pipeline talks to "something that can produce text from instructions
//! plus input under a token budget" through the [`Generator`] trait; the
//! concrete adapter calls the OpenAI Responses API.
//!
//! # Retry Strategy
//!
//! Transient failures use exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use async_trait::async_trait;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::error::{PipelineError, Result};

const OPENAI_RESPONSES_URL: &str = "https://api.openai.com/v1/responses";

/// Text-generation capability boundary. The core defines no retry policy of
/// its own; whatever the adapter does internally, a returned error is fatal
/// for the current request.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        instructions: &str,
        input: &str,
        max_output_tokens: u32,
        temperature: Option<f32>,
    ) -> Result<String>;
}

/// Adapter for the OpenAI Responses API.
pub struct OpenAiGenerator {
    api_key: String,
    model: String,
    timeout_secs: u64,
    max_retries: u32,
}

impl OpenAiGenerator {
    /// Reads `OPENAI_API_KEY` once; the key is held for the process
    /// lifetime rather than re-read per call.
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| PipelineError::Config("OPENAI_API_KEY not set".to_string()))?;

        Ok(Self {
            api_key,
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn generate(
        &self,
        instructions: &str,
        input: &str,
        max_output_tokens: u32,
        temperature: Option<f32>,
    ) -> Result<String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| PipelineError::Generation(e.to_string()))?;

        let mut body = serde_json::json!({
            "model": self.model,
            "instructions": instructions,
            "input": input,
            "max_output_tokens": max_output_tokens,
        });
        if let Some(temp) = temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post(OPENAI_RESPONSES_URL)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| PipelineError::Generation(e.to_string()))?;
                        return parse_output_text(&json);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(PipelineError::Generation(format!(
                            "OpenAI API error {}: {}",
                            status, body_text
                        )));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    return Err(PipelineError::Generation(format!(
                        "OpenAI API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(PipelineError::Generation(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| PipelineError::Generation("generation failed after retries".into())))
    }
}

/// Extract the concatenated `output_text` content from a Responses API
/// payload.
fn parse_output_text(json: &serde_json::Value) -> Result<String> {
    let output = json
        .get("output")
        .and_then(|o| o.as_array())
        .ok_or_else(|| {
            PipelineError::Generation("invalid OpenAI response: missing output array".into())
        })?;

    let mut text = String::new();
    for item in output {
        let Some(content) = item.get("content").and_then(|c| c.as_array()) else {
            continue;
        };
        for part in content {
            if part.get("type").and_then(|t| t.as_str()) == Some("output_text") {
                if let Some(t) = part.get("text").and_then(|t| t.as_str()) {
                    text.push_str(t);
                }
            }
        }
    }

    if text.is_empty() {
        return Err(PipelineError::Generation(
            "invalid OpenAI response: no output_text content".into(),
        ));
    }

    Ok(text.trim().to_string())
}
