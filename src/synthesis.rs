//! Speech-synthesis collaborator abstraction.
//!
//! Mirrors the generation seam: the pipeline sees only "text in, audio
//! bytes out" via [`Synthesizer`]; the concrete adapter calls the
//! ElevenLabs text-to-speech API. Before the request the spoken text gets a
//! minimal layer of delivery tags ([`apply_speech_tags`]) understood by the
//! v3 voice models.

use async_trait::async_trait;
use regex::{Captures, Regex};
use std::time::Duration;

use crate::config::SynthesisConfig;
use crate::error::{PipelineError, Result};

const ELEVENLABS_TTS_BASE: &str = "https://api.elevenlabs.io/v1/text-to-speech";

#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` into encoded audio (mp3 by default).
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// Adapter for the ElevenLabs TTS API.
pub struct ElevenLabsSynthesizer {
    api_key: String,
    config: SynthesisConfig,
}

impl ElevenLabsSynthesizer {
    /// Reads `ELEVEN_API_KEY` (or the legacy `ELEVENLABS_API_KEY`) once at
    /// construction. A voice id is required: there is no sensible default
    /// voice for a persona.
    pub fn new(config: &SynthesisConfig) -> Result<Self> {
        let api_key = std::env::var("ELEVEN_API_KEY")
            .or_else(|_| std::env::var("ELEVENLABS_API_KEY"))
            .map_err(|_| {
                PipelineError::Config("ELEVEN_API_KEY or ELEVENLABS_API_KEY not set".to_string())
            })?;

        if config.voice_id.is_empty() {
            return Err(PipelineError::Config(
                "synthesis.voice_id must be set".to_string(),
            ));
        }

        Ok(Self {
            api_key,
            config: config.clone(),
        })
    }
}

#[async_trait]
impl Synthesizer for ElevenLabsSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let tagged = apply_speech_tags(text);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()
            .map_err(|e| PipelineError::Synthesis(e.to_string()))?;

        let url = format!(
            "{}/{}?output_format={}",
            ELEVENLABS_TTS_BASE, self.config.voice_id, self.config.output_format
        );

        let body = serde_json::json!({
            "text": tagged,
            "model_id": self.config.model_id,
            "voice_settings": {
                "stability": self.config.stability,
                "similarity_boost": self.config.similarity_boost,
                "style": self.config.style,
                "use_speaker_boost": self.config.use_speaker_boost,
            },
        });

        let response = client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .header("Accept", "audio/mpeg")
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Synthesis(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(PipelineError::Synthesis(format!(
                "ElevenLabs API error {}: {}",
                status, body_text
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PipelineError::Synthesis(e.to_string()))?;

        Ok(bytes.to_vec())
    }
}

/// Decorate sanitized spoken text with minimal v3 delivery tags:
/// an `[understated]` register for the whole message, a `[pause]` after the
/// first two sentences, and a `[deliberate]` marker before the first
/// pacing word.
pub fn apply_speech_tags(text: &str) -> String {
    let mut s = format!("[understated] {}", text.trim());

    let pause_re = Regex::new("。").unwrap();
    let mut count = 0;
    s = pause_re
        .replace_all(&s, |_: &Captures| {
            count += 1;
            if count <= 2 {
                "。[pause]".to_string()
            } else {
                "。".to_string()
            }
        })
        .into_owned();

    let deliberate_re = Regex::new("(まず|次は|一度|もし)").unwrap();
    s = deliberate_re.replace(&s, "[deliberate] $1").into_owned();

    let ws_re = Regex::new(r"\s+").unwrap();
    ws_re.replace_all(&s, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_understated_prefix() {
        let out = apply_speech_tags("大丈夫ですよ。");
        assert!(out.starts_with("[understated] "));
    }

    #[test]
    fn test_at_most_two_pauses() {
        let out = apply_speech_tags("一文目。二文目。三文目。四文目。");
        assert_eq!(out.matches("[pause]").count(), 2);
        assert!(out.contains("一文目。[pause]"));
        assert!(out.contains("二文目。[pause]"));
        assert!(out.contains("三文目。四文目。"));
    }

    #[test]
    fn test_deliberate_marks_only_first_pacing_word() {
        let out = apply_speech_tags("まず記録を集めます。もし難しければ相談しましょう。");
        assert_eq!(out.matches("[deliberate]").count(), 1);
        assert!(out.contains("[deliberate] まず"));
    }

    #[test]
    fn test_no_pacing_word_no_deliberate() {
        let out = apply_speech_tags("大丈夫ですよ。");
        assert!(!out.contains("[deliberate]"));
    }
}
