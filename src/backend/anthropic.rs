//! Hosted adapter for the Anthropic messages API.
//!
//! Takes the system prompt in a dedicated field and the whole transcript as
//! one flattened user message ending with the reply cue line.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::backend::{GenerationError, LlmBackend, SamplingConfig};
use crate::config::ConfigError;
use crate::prompt::CanonicalPrompt;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug)]
pub struct AnthropicClient {
    api_key: String,
    default_model: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<ApiMessage>,
}

#[derive(Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

impl AnthropicClient {
    pub fn new(api_key: &str, default_model: &str, timeout: Duration) -> Result<Self, ConfigError> {
        if api_key.is_empty() {
            return Err(ConfigError::Validation("anthropic_api_key is empty".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Validation(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.to_string(),
            default_model: default_model.to_string(),
            http,
        })
    }
}

#[async_trait]
impl LlmBackend for AnthropicClient {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn default_sampling(&self) -> SamplingConfig {
        SamplingConfig {
            temperature: 0.8,
            top_p: 1.0,
            max_tokens: 300,
            repeat_penalty: 1.0,
            top_k: None,
        }
    }

    async fn generate(
        &self,
        prompt: &CanonicalPrompt,
        model: Option<&str>,
        sampling: &SamplingConfig,
    ) -> Result<String, GenerationError> {
        let model = model.unwrap_or(&self.default_model);
        let request = ApiRequest {
            model,
            max_tokens: sampling.max_tokens,
            temperature: sampling.temperature,
            system: &prompt.system,
            messages: vec![ApiMessage { role: "user", content: prompt.flatten() }],
        };

        debug!("anthropic generate: model={model}");

        let response = self
            .http
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(GenerationError::from_transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api(format!("{status}: {body}")));
        }

        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Parse(e.to_string()))?;

        parsed
            .content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(GenerationError::Empty)
    }
}
