//! Top-level chat entry point.
//!
//! One linear pipeline per turn: quota gate, context assembly, backend
//! dispatch, response cleanup. Whatever happens inside, the caller gets a
//! displayable outcome — quota denial is a distinct variant (so the UI can
//! upsell instead of showing an error banner) and backend failures become
//! fixed in-character apologies. There is no retry and no cross-backend
//! fallback; one failed call is one apology.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::backend::{
    AnthropicClient, BackendKind, GenerationError, LlmBackend, OllamaClient, OpenAiClient,
    SamplingConfig,
};
use crate::character::CharacterProfile;
use crate::config::{Config, ConfigError};
use crate::prompt::{PromptVariant, Turn, build_prompt};
use crate::quota::{QuotaState, Tier};
use crate::sanitize;

/// Per-call knobs. Anything left `None` falls back to configuration or the
/// selected backend's own defaults.
#[derive(Debug, Default, Clone)]
pub struct GenerationOverrides {
    /// Force a specific backend regardless of the configured default.
    pub backend: Option<BackendKind>,
    /// Model identifier understood by the selected backend.
    pub model: Option<String>,
    pub sampling: Option<SamplingConfig>,
    pub variant: Option<PromptVariant>,
}

/// What a chat turn produced. `LimitReached` is the quota sentinel, not an
/// error — callers branch on it to show the upsell prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    /// A displayable reply (a generated one, or a fixed apology).
    Reply(String),
    /// The user's daily quota is spent.
    LimitReached,
}

/// Routes chat turns to the configured backends.
pub struct ChatRouter {
    default_backend: BackendKind,
    limit_standard: u32,
    limit_elevated: u32,
    backends: HashMap<BackendKind, Box<dyn LlmBackend>>,
}

impl ChatRouter {
    /// Wire up the real backends from configuration. The local backend is
    /// always constructed; hosted ones only when their credential is present.
    /// Fails fast if the configured default ends up unavailable.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let mut backends: HashMap<BackendKind, Box<dyn LlmBackend>> = HashMap::new();

        backends.insert(
            BackendKind::Ollama,
            Box::new(OllamaClient::new(&config.ollama_base_url, &config.ollama_model, timeout)?),
        );
        if !config.openai_api_key.is_empty() {
            backends.insert(
                BackendKind::OpenAi,
                Box::new(OpenAiClient::new(&config.openai_api_key, &config.openai_model, timeout)?),
            );
        }
        if !config.anthropic_api_key.is_empty() {
            backends.insert(
                BackendKind::Anthropic,
                Box::new(AnthropicClient::new(
                    &config.anthropic_api_key,
                    &config.anthropic_model,
                    timeout,
                )?),
            );
        }

        Self::new(
            config.default_backend,
            config.daily_limit_standard,
            config.daily_limit_elevated,
            backends,
        )
    }

    /// Dependency-injecting constructor; tests hand in fake backends here.
    pub fn new(
        default_backend: BackendKind,
        limit_standard: u32,
        limit_elevated: u32,
        backends: HashMap<BackendKind, Box<dyn LlmBackend>>,
    ) -> Result<Self, ConfigError> {
        if !backends.contains_key(&default_backend) {
            return Err(ConfigError::Validation(format!(
                "default backend '{default_backend}' is not configured"
            )));
        }
        Ok(Self { default_backend, limit_standard, limit_elevated, backends })
    }

    /// The daily message cap for a tier.
    pub fn daily_limit(&self, tier: Tier) -> u32 {
        match tier {
            Tier::Standard => self.limit_standard,
            Tier::Elevated => self.limit_elevated,
        }
    }

    /// Handle one chat turn. Mutates `quota` (day rollover, and the increment
    /// on success); the caller persists it in its own transaction.
    pub async fn respond(
        &self,
        quota: &mut QuotaState,
        tier: Tier,
        character: &CharacterProfile,
        history: &[Turn],
        user_text: &str,
        overrides: &GenerationOverrides,
    ) -> ChatOutcome {
        let today = Utc::now().date_naive();
        if !quota.allow(self.daily_limit(tier), today) {
            info!("quota reached ({} tier)", tier.as_str());
            return ChatOutcome::LimitReached;
        }

        let kind = BackendKind::resolve(overrides.backend, Some(self.default_backend));
        // The character framing was tuned on the local models; hosted APIs
        // get the generic one unless the caller says otherwise.
        let variant = overrides.variant.unwrap_or(match kind {
            BackendKind::Ollama => PromptVariant::Character,
            _ => PromptVariant::Generic,
        });
        let prompt = build_prompt(character, history, user_text, variant);

        let Some(backend) = self.backends.get(&kind) else {
            warn!("backend '{kind}' requested but not configured");
            return ChatOutcome::Reply(busy_apology(&character.name));
        };

        let sampling = overrides
            .sampling
            .clone()
            .unwrap_or_else(|| backend.default_sampling());

        info!("💬 routing turn to {} ({} turns of history)", backend.name(), prompt.turns.len());

        match backend.generate(&prompt, overrides.model.as_deref(), &sampling).await {
            Ok(raw) => {
                quota.record_message(today);
                ChatOutcome::Reply(sanitize::clean(&raw))
            }
            Err(e) => {
                warn!("{} generation failed: {e}", backend.name());
                ChatOutcome::Reply(apology_for(&e, &character.name))
            }
        }
    }
}

/// Used when the backend is unreachable, erroring, or timing out.
fn busy_apology(name: &str) -> String {
    format!("Sorry, {name} is a little tied up right now. Try writing again later! 😊")
}

/// Used when the backend answered but the reply was unusable.
fn garbled_apology(name: &str) -> String {
    format!("Oops, {name} can't find the words right now. Try again! 💕")
}

fn apology_for(error: &GenerationError, name: &str) -> String {
    match error {
        GenerationError::Http(_) | GenerationError::Api(_) | GenerationError::Timeout => {
            busy_apology(name)
        }
        GenerationError::Parse(_) | GenerationError::Empty => garbled_apology(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Scripted backend: returns the queued result once, counts calls.
    struct FakeBackend {
        reply: Mutex<Option<Result<String, GenerationError>>>,
        calls: AtomicUsize,
    }

    impl FakeBackend {
        fn ok(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Some(Ok(text.to_string()))),
                calls: AtomicUsize::new(0),
            })
        }

        fn err(error: GenerationError) -> Arc<Self> {
            Arc::new(Self { reply: Mutex::new(Some(Err(error))), calls: AtomicUsize::new(0) })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmBackend for Arc<FakeBackend> {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn default_sampling(&self) -> SamplingConfig {
            SamplingConfig {
                temperature: 0.5,
                top_p: 1.0,
                max_tokens: 100,
                repeat_penalty: 1.0,
                top_k: None,
            }
        }

        async fn generate(
            &self,
            _prompt: &crate::prompt::CanonicalPrompt,
            _model: Option<&str>,
            _sampling: &SamplingConfig,
        ) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.lock().unwrap().take().expect("unexpected extra generate call")
        }
    }

    fn anna() -> CharacterProfile {
        CharacterProfile::new("Anna", "a kind girl", "caring", false)
    }

    fn fresh_quota() -> QuotaState {
        QuotaState { messages_used_today: 0, last_message_date: Some(Utc::now().date_naive()) }
    }

    fn router_with(kind: BackendKind, fake: &Arc<FakeBackend>) -> ChatRouter {
        let mut backends: HashMap<BackendKind, Box<dyn LlmBackend>> = HashMap::new();
        backends.insert(kind, Box::new(fake.clone()));
        ChatRouter::new(kind, 10, 100, backends).unwrap()
    }

    #[tokio::test]
    async fn test_success_is_cleaned_and_counted() {
        let fake = FakeBackend::ok("  hi there  ");
        let router = router_with(BackendKind::Ollama, &fake);
        let mut quota = fresh_quota();
        let outcome = router
            .respond(&mut quota, Tier::Standard, &anna(), &[], "hello", &Default::default())
            .await;
        // Post-processor trimmed and appended the default glyph.
        assert_eq!(outcome, ChatOutcome::Reply("hi there 😊".to_string()));
        assert_eq!(quota.messages_used_today, 1);
    }

    #[tokio::test]
    async fn test_quota_denied_never_invokes_backend() {
        let fake = FakeBackend::ok("unused");
        let router = router_with(BackendKind::Ollama, &fake);
        let mut quota = QuotaState {
            messages_used_today: 10,
            last_message_date: Some(Utc::now().date_naive()),
        };
        let outcome = router
            .respond(&mut quota, Tier::Standard, &anna(), &[], "hello", &Default::default())
            .await;
        assert_eq!(outcome, ChatOutcome::LimitReached);
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test]
    async fn test_elevated_tier_uses_higher_limit() {
        let fake = FakeBackend::ok("hey 😊");
        let router = router_with(BackendKind::Ollama, &fake);
        let mut quota = QuotaState {
            messages_used_today: 50,
            last_message_date: Some(Utc::now().date_naive()),
        };
        let outcome = router
            .respond(&mut quota, Tier::Elevated, &anna(), &[], "hello", &Default::default())
            .await;
        assert!(matches!(outcome, ChatOutcome::Reply(_)));
    }

    #[tokio::test]
    async fn test_transport_failure_yields_busy_apology() {
        let fake = FakeBackend::err(GenerationError::Http("connection refused".into()));
        let router = router_with(BackendKind::Ollama, &fake);
        let mut quota = fresh_quota();
        let outcome = router
            .respond(&mut quota, Tier::Standard, &anna(), &[], "hello", &Default::default())
            .await;
        assert_eq!(outcome, ChatOutcome::Reply(busy_apology("Anna")));
        // Failed turns don't burn quota.
        assert_eq!(quota.messages_used_today, 0);
    }

    #[tokio::test]
    async fn test_malformed_response_yields_garbled_apology() {
        let fake = FakeBackend::err(GenerationError::Empty);
        let router = router_with(BackendKind::Ollama, &fake);
        let mut quota = fresh_quota();
        let outcome = router
            .respond(&mut quota, Tier::Standard, &anna(), &[], "hello", &Default::default())
            .await;
        assert_eq!(outcome, ChatOutcome::Reply(garbled_apology("Anna")));
    }

    #[tokio::test]
    async fn test_timeout_yields_busy_apology() {
        let fake = FakeBackend::err(GenerationError::Timeout);
        let router = router_with(BackendKind::Ollama, &fake);
        let mut quota = fresh_quota();
        let outcome = router
            .respond(&mut quota, Tier::Standard, &anna(), &[], "hello", &Default::default())
            .await;
        assert_eq!(outcome, ChatOutcome::Reply(busy_apology("Anna")));
    }

    #[tokio::test]
    async fn test_override_routes_to_requested_backend() {
        let default_fake = FakeBackend::ok("from default 😊");
        let hosted_fake = FakeBackend::ok("from hosted 😊");
        let mut backends: HashMap<BackendKind, Box<dyn LlmBackend>> = HashMap::new();
        backends.insert(BackendKind::Ollama, Box::new(default_fake.clone()));
        backends.insert(BackendKind::Anthropic, Box::new(hosted_fake.clone()));
        let router = ChatRouter::new(BackendKind::Ollama, 10, 100, backends).unwrap();

        let overrides = GenerationOverrides {
            backend: Some(BackendKind::Anthropic),
            ..Default::default()
        };
        let mut quota = fresh_quota();
        let outcome = router
            .respond(&mut quota, Tier::Standard, &anna(), &[], "hello", &overrides)
            .await;
        assert_eq!(outcome, ChatOutcome::Reply("from hosted 😊".to_string()));
        assert_eq!(hosted_fake.calls(), 1);
        assert_eq!(default_fake.calls(), 0);
    }

    #[tokio::test]
    async fn test_override_to_missing_backend_apologizes() {
        let fake = FakeBackend::ok("unused");
        let router = router_with(BackendKind::Ollama, &fake);
        let overrides = GenerationOverrides {
            backend: Some(BackendKind::OpenAi),
            ..Default::default()
        };
        let mut quota = fresh_quota();
        let outcome = router
            .respond(&mut quota, Tier::Standard, &anna(), &[], "hello", &overrides)
            .await;
        assert_eq!(outcome, ChatOutcome::Reply(busy_apology("Anna")));
    }

    #[tokio::test]
    async fn test_limit_then_sentinel_scenario() {
        // Ninth message goes through, tenth check hits the cap.
        let fake = FakeBackend::ok("reply 😊");
        let router = router_with(BackendKind::Ollama, &fake);
        let mut quota = QuotaState {
            messages_used_today: 9,
            last_message_date: Some(Utc::now().date_naive()),
        };
        let outcome = router
            .respond(&mut quota, Tier::Standard, &anna(), &[], "hello", &Default::default())
            .await;
        assert!(matches!(outcome, ChatOutcome::Reply(_)));
        assert_eq!(quota.messages_used_today, 10);

        let outcome = router
            .respond(&mut quota, Tier::Standard, &anna(), &[], "again", &Default::default())
            .await;
        assert_eq!(outcome, ChatOutcome::LimitReached);
    }

    #[test]
    fn test_default_backend_must_be_configured() {
        let backends: HashMap<BackendKind, Box<dyn LlmBackend>> = HashMap::new();
        match ChatRouter::new(BackendKind::Ollama, 10, 100, backends) {
            Ok(_) => panic!("expected a validation error"),
            Err(e) => assert!(matches!(e, ConfigError::Validation(_))),
        }
    }
}
