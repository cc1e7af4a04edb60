//! LLM backend adapters.
//!
//! One capability trait, three implementations: a local inference server
//! (Ollama) and two hosted APIs (OpenAI, Anthropic). Each adapter translates
//! the canonical prompt into its backend's call shape and normalizes the
//! response; no backend-specific type crosses this module boundary outward.
//! Transport failures come back as `GenerationError` values, never panics,
//! and there is no retry here — one failure is terminal for the call.

pub mod anthropic;
pub mod ollama;
pub mod openai;

pub use anthropic::AnthropicClient;
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::prompt::CanonicalPrompt;

/// The closed set of selectable backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Local inference server.
    #[default]
    Ollama,
    OpenAi,
    Anthropic,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Ollama => "ollama",
            BackendKind::OpenAi => "openai",
            BackendKind::Anthropic => "anthropic",
        }
    }

    /// Resolve which backend serves a call: explicit override first, then the
    /// configured default, then the hard-coded fallback (local). Evaluated
    /// once per call; a failure afterwards never reroutes.
    pub fn resolve(explicit: Option<BackendKind>, configured: Option<BackendKind>) -> BackendKind {
        explicit.or(configured).unwrap_or_default()
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sampling parameters for one generation call. Each adapter ships its own
/// defaults; callers may override per call.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingConfig {
    pub temperature: f32,
    pub top_p: f32,
    /// Maximum output tokens.
    pub max_tokens: u32,
    pub repeat_penalty: f32,
    pub top_k: Option<u32>,
}

/// Why a generation call produced no text. Everything a backend can do wrong
/// lands in one of these; the router turns them into user-facing apologies.
#[derive(Debug)]
pub enum GenerationError {
    /// Could not reach the backend at all.
    Http(String),
    /// The backend answered with a non-success status (auth, rate limit, ...).
    Api(String),
    /// The response body did not have the expected shape.
    Parse(String),
    /// A well-formed response with no usable text in it.
    Empty,
    /// The call exceeded its deadline.
    Timeout,
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::Http(e) => write!(f, "HTTP error: {e}"),
            GenerationError::Api(e) => write!(f, "API error: {e}"),
            GenerationError::Parse(e) => write!(f, "Parse error: {e}"),
            GenerationError::Empty => write!(f, "Empty response"),
            GenerationError::Timeout => write!(f, "Request timed out"),
        }
    }
}

impl std::error::Error for GenerationError {}

impl GenerationError {
    /// Classify a reqwest transport error, keeping timeouts distinct so a
    /// cancelled call surfaces as such instead of hanging the router.
    pub(crate) fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GenerationError::Timeout
        } else {
            GenerationError::Http(e.to_string())
        }
    }
}

/// Capability interface every backend adapter implements.
///
/// `generate` takes the provider-agnostic prompt, an optional model override
/// and the sampling parameters, and returns either reply text or a
/// `GenerationError` — callers never see a backend's own error types.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// The sampling parameters this backend was tuned with.
    fn default_sampling(&self) -> SamplingConfig;

    async fn generate(
        &self,
        prompt: &CanonicalPrompt,
        model: Option<&str>,
        sampling: &SamplingConfig,
    ) -> Result<String, GenerationError>;
}
