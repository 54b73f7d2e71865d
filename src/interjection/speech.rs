//! Text-to-speech.
//!
//! [`HttpSpeechSynthesizer`] posts to an OpenAI-compatible
//! `/v1/audio/speech` endpoint and returns the encoded audio bytes (MP3 by
//! default), which the sink plays from memory.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::SpeechConfig;

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("nothing to say")]
    EmptyText,

    #[error("speech request failed: {0}")]
    Request(String),

    #[error("speech request timed out")]
    Timeout,

    #[error("speech endpoint returned no audio")]
    EmptyAudio,
}

impl From<reqwest::Error> for SpeechError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SpeechError::Timeout
        } else {
            SpeechError::Request(e.to_string())
        }
    }
}

/// Turns a script into encoded audio.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SpeechError>;
}

pub struct HttpSpeechSynthesizer {
    client: reqwest::Client,
    config: SpeechConfig,
}

impl HttpSpeechSynthesizer {
    pub fn from_config(config: &SpeechConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            config: config.clone(),
        }
    }

    fn request_body(&self, text: &str) -> serde_json::Value {
        serde_json::json!({
            "model":           self.config.model,
            "voice":           self.config.voice,
            "input":           text,
            "language":        self.config.language,
            "response_format": "mp3"
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSpeechSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SpeechError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SpeechError::EmptyText);
        }

        let url = format!("{}/v1/audio/speech", self.config.base_url.trim_end_matches('/'));
        let mut req = self.client.post(&url).json(&self.request_body(text));
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            req = req.bearer_auth(key);
        }

        let bytes = req.send().await?.error_for_status()?.bytes().await?;
        if bytes.is_empty() {
            return Err(SpeechError::EmptyAudio);
        }
        log::debug!("interjection: synthesized {} bytes of speech", bytes.len());
        Ok(bytes.to_vec())
    }
}
