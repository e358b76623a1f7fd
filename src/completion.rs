//! Text completion backends.
//!
//! The completion service is opaque: a prompt goes in, raw text comes out.
//! Everything it returns is untrusted and goes through
//! [`crate::constrain::ResponseConstrainer`] before anyone sees it.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::CompletionConfig;
use crate::error::{ChadError, Result};

/// A prompt-in, text-out language model.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

// ── Ollama ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f64,
    top_p: f64,
    num_predict: u32,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Ollama's non-streaming `/api/generate` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaCompletion {
    client: reqwest::Client,
    config: CompletionConfig,
}

impl OllamaCompletion {
    pub fn new(config: CompletionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.config.api_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionService for OllamaCompletion {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                num_predict: self.config.max_tokens,
            },
        };

        let response = self.client.post(self.endpoint()).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = crate::voice::error::truncate_detail(&text);
            warn!(status = status.as_u16(), model = %self.config.model, "completion request failed");
            return Err(ChadError::Completion(format!("HTTP {status}: {detail}")));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ChadError::Completion(format!("unreadable completion body: {e}")))?;
        debug!(model = %self.config.model, chars = parsed.response.len(), "completion received");
        Ok(parsed.response)
    }
}
