//! Hosted adapter for the OpenAI chat completions API.
//!
//! The only backend that takes the context as a role-tagged message list:
//! each history turn maps to a `user`/`assistant` message and the new
//! utterance goes last as a `user` message.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::backend::{GenerationError, LlmBackend, SamplingConfig};
use crate::config::ConfigError;
use crate::prompt::CanonicalPrompt;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Nudges against verbatim repetition; the chat API has no direct
/// repeat-penalty knob, so these stay fixed.
const PRESENCE_PENALTY: f32 = 0.1;
const FREQUENCY_PENALTY: f32 = 0.1;

#[derive(Debug)]
pub struct OpenAiClient {
    api_key: String,
    default_model: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    presence_penalty: f32,
    frequency_penalty: f32,
}

#[derive(Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(api_key: &str, default_model: &str, timeout: Duration) -> Result<Self, ConfigError> {
        if api_key.is_empty() {
            return Err(ConfigError::Validation("openai_api_key is empty".into()));
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

    fn messages(prompt: &CanonicalPrompt) -> Vec<ApiMessage> {
        let mut messages = Vec::with_capacity(prompt.turns.len() + 2);
        messages.push(ApiMessage { role: "system", content: prompt.system.clone() });
        for turn in &prompt.turns {
            messages.push(ApiMessage {
                role: if turn.is_user { "user" } else { "assistant" },
                content: turn.text.clone(),
            });
        }
        messages.push(ApiMessage { role: "user", content: prompt.user_text.clone() });
        messages
    }
}

#[async_trait]
impl LlmBackend for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
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
            messages: Self::messages(prompt),
            max_tokens: sampling.max_tokens,
            temperature: sampling.temperature,
            top_p: sampling.top_p,
            presence_penalty: PRESENCE_PENALTY,
            frequency_penalty: FREQUENCY_PENALTY,
        };

        debug!("openai generate: model={model}, messages={}", request.messages.len());

        let response = self
            .http
            .post(OPENAI_API_URL)
            .bearer_auth(&self.api_key)
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
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(GenerationError::Empty)
    }
}
