//! Local inference server adapter (Ollama).
//!
//! Speaks the `/api/generate` shape: one flattened prompt string plus a
//! separate system string, sampling knobs under `options`. Also exposes model
//! discovery over `/api/tags` so callers can check what is installed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::backend::{GenerationError, LlmBackend, SamplingConfig};
use crate::config::ConfigError;
use crate::prompt::CanonicalPrompt;

#[derive(Debug)]
pub struct OllamaClient {
    base_url: String,
    default_model: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    system: &'a str,
    stream: bool,
    options: Options,
}

#[derive(Serialize)]
struct Options {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
    repeat_penalty: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

/// One installed model as reported by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelTag {
    pub name: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, default_model: &str, timeout: Duration) -> Result<Self, ConfigError> {
        if base_url.is_empty() {
            return Err(ConfigError::Validation("ollama base URL is empty".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Validation(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            default_model: default_model.to_string(),
            http,
        })
    }

    /// List the models installed on the server.
    pub async fn list_models(&self) -> Result<Vec<ModelTag>, GenerationError> {
        let response = self
            .http
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(GenerationError::from_transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api(format!("{status}: {body}")));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Parse(e.to_string()))?;
        Ok(tags.models)
    }

    /// Whether `model` is installed locally.
    pub async fn is_model_available(&self, model: &str) -> bool {
        match self.list_models().await {
            Ok(models) => models.iter().any(|m| m.name == model),
            Err(e) => {
                warn!("model listing failed: {e}");
                false
            }
        }
    }
}

#[async_trait]
impl LlmBackend for OllamaClient {
    fn name(&self) -> &'static str {
        "ollama"
    }

    fn default_sampling(&self) -> SamplingConfig {
        SamplingConfig {
            temperature: 0.85,
            top_p: 0.92,
            max_tokens: 250,
            repeat_penalty: 1.15,
            top_k: Some(40),
        }
    }

    async fn generate(
        &self,
        prompt: &CanonicalPrompt,
        model: Option<&str>,
        sampling: &SamplingConfig,
    ) -> Result<String, GenerationError> {
        let model = model.unwrap_or(&self.default_model);
        let request = GenerateRequest {
            model,
            prompt: prompt.flatten(),
            system: &prompt.system,
            stream: false,
            options: Options {
                temperature: sampling.temperature,
                top_p: sampling.top_p,
                num_predict: sampling.max_tokens,
                repeat_penalty: sampling.repeat_penalty,
                top_k: sampling.top_k,
            },
        };

        debug!("ollama generate: model={model}");

        let response = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(GenerationError::from_transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api(format!("{status}: {body}")));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Parse(e.to_string()))?;

        match parsed.response {
            Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            _ => Err(GenerationError::Empty),
        }
    }
}
