//! Character-chat generation core.
//!
//! Routes user conversation turns to one of several interchangeable LLM
//! backends, assembles a bounded conversational context per character, and
//! gates generation behind a tiered daily message quota. The surrounding
//! surfaces (bot commands, payment webhooks, UI) live with the embedding
//! application; this crate exposes only in-process contracts.

pub mod backend;
pub mod character;
pub mod config;
pub mod logging;
pub mod prompt;
pub mod quota;
pub mod router;
pub mod sanitize;
pub mod store;

pub use backend::{BackendKind, GenerationError, LlmBackend, SamplingConfig};
pub use character::CharacterProfile;
pub use config::{Config, ConfigError};
pub use prompt::{CanonicalPrompt, PromptVariant, Turn, build_prompt};
pub use quota::{QuotaState, Tier, effective_tier};
pub use router::{ChatOutcome, ChatRouter, GenerationOverrides};
pub use store::Store;
