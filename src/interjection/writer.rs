//! `ScriptWriter` trait and the `ApiScriptWriter` implementation.
//!
//! `ApiScriptWriter` calls any OpenAI-compatible `/v1/chat/completions`
//! endpoint (OpenAI, Groq, Ollama in OpenAI mode, LM Studio, vLLM).  All
//! connection details come from [`LlmConfig`].

use async_trait::async_trait;
use thiserror::Error;

use crate::config::LlmConfig;

use super::prompt::{PromptCatalog, PromptKind};

// ---------------------------------------------------------------------------
// ScriptError
// ---------------------------------------------------------------------------

/// Errors that can occur while writing a DJ script.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The writer is switched off or has no credentials.
    #[error("script writer is disabled")]
    Disabled,

    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("script request timed out")]
    Timeout,

    /// The response could not be parsed as expected JSON.
    #[error("failed to parse script response: {0}")]
    Parse(String),

    /// The endpoint returned no usable text.
    #[error("script writer returned an empty response")]
    EmptyResponse,
}

impl From<reqwest::Error> for ScriptError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ScriptError::Timeout
        } else {
            ScriptError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ScriptWriter trait
// ---------------------------------------------------------------------------

/// Writes short on-air scripts.
///
/// * `kind`   – what sort of script to write.
/// * `recent` – scripts aired lately, oldest first, to steer away from.
#[async_trait]
pub trait ScriptWriter: Send + Sync {
    async fn write(&self, kind: PromptKind, recent: &[String]) -> Result<String, ScriptError>;

    /// Whether calling [`write`](Self::write) can succeed at all.
    fn is_enabled(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// ApiScriptWriter
// ---------------------------------------------------------------------------

/// Calls an OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct ApiScriptWriter {
    client: reqwest::Client,
    config: LlmConfig,
    catalog: PromptCatalog,
}

impl ApiScriptWriter {
    /// Build a writer for `station` from the LLM settings.
    pub fn from_config(config: &LlmConfig, station: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
            catalog: PromptCatalog::new(station),
        }
    }

    fn api_key(&self) -> Option<&str> {
        self.config.api_key.as_deref().filter(|k| !k.is_empty())
    }
}

/// Local endpoints (Ollama, LM Studio) need no key.
fn is_local(base_url: &str) -> bool {
    let rest = base_url
        .trim_start_matches("http://")
        .trim_start_matches("https://");
    rest.starts_with("localhost") || rest.starts_with("127.0.0.1") || rest.starts_with("[::1]")
}

#[async_trait]
impl ScriptWriter for ApiScriptWriter {
    async fn write(&self, kind: PromptKind, recent: &[String]) -> Result<String, ScriptError> {
        if !self.is_enabled() {
            return Err(ScriptError::Disabled);
        }

        let (system_msg, user_msg) = self.catalog.build_chat(kind, recent);
        let url = format!("{}/v1/chat/completions", self.config.base_url.trim_end_matches('/'));

        let body = serde_json::json!({
            "model":       self.config.model,
            "messages": [
                { "role": "system", "content": system_msg },
                { "role": "user",   "content": user_msg   }
            ],
            "stream":      false,
            "temperature": self.config.temperature,
            "max_tokens":  self.config.max_tokens
        });

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = self.api_key() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?.error_for_status()?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ScriptError::Parse(e.to_string()))?;

        let script = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(ScriptError::EmptyResponse)?
            .trim()
            .trim_matches('"')
            .to_string();

        if script.is_empty() {
            return Err(ScriptError::EmptyResponse);
        }

        log::info!("interjection: wrote {kind} script: {script}");
        Ok(script)
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled && (self.api_key().is_some() || is_local(&self.config.base_url))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config(base_url: &str, api_key: Option<&str>) -> LlmConfig {
        LlmConfig {
            base_url: base_url.into(),
            api_key: api_key.map(|s| s.to_string()),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn remote_endpoint_needs_a_key() {
        let writer = ApiScriptWriter::from_config(&make_config("https://api.openai.com", None), "FM");
        assert!(!writer.is_enabled());

        let writer =
            ApiScriptWriter::from_config(&make_config("https://api.openai.com", Some("")), "FM");
        assert!(!writer.is_enabled());

        let writer =
            ApiScriptWriter::from_config(&make_config("https://api.openai.com", Some("sk-1")), "FM");
        assert!(writer.is_enabled());
    }

    #[test]
    fn local_endpoint_works_without_key() {
        let writer = ApiScriptWriter::from_config(&make_config("http://localhost:11434", None), "FM");
        assert!(writer.is_enabled());
    }

    #[test]
    fn disabled_in_config() {
        let mut config = make_config("http://localhost:11434", None);
        config.enabled = false;
        assert!(!ApiScriptWriter::from_config(&config, "FM").is_enabled());
    }

    #[tokio::test]
    async fn disabled_writer_fails_fast() {
        let writer = ApiScriptWriter::from_config(&make_config("https://api.openai.com", None), "FM");
        let err = writer.write(PromptKind::StationId, &[]).await.unwrap_err();
        assert!(matches!(err, ScriptError::Disabled));
    }

    #[test]
    fn writer_is_object_safe() {
        let writer: Box<dyn ScriptWriter> =
            Box::new(ApiScriptWriter::from_config(&LlmConfig::default(), "FM"));
        drop(writer);
    }
}
