use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::backend::BackendKind;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    /// Backend used when a call carries no explicit override.
    #[serde(default)]
    default_backend: BackendKind,
    /// Daily message cap for the standard tier.
    #[serde(default = "default_limit_standard")]
    daily_limit_standard: u32,
    /// Daily message cap for the elevated (subscriber) tier.
    #[serde(default = "default_limit_elevated")]
    daily_limit_elevated: u32,
    #[serde(default = "default_ollama_base_url")]
    ollama_base_url: String,
    #[serde(default = "default_ollama_model")]
    ollama_model: String,
    #[serde(default)]
    openai_api_key: String,
    #[serde(default = "default_openai_model")]
    openai_model: String,
    #[serde(default)]
    anthropic_api_key: String,
    #[serde(default = "default_anthropic_model")]
    anthropic_model: String,
    /// Per-request timeout for backend calls, in seconds.
    #[serde(default = "default_request_timeout")]
    request_timeout_secs: u64,
    /// Directory for state files (database, logs). Defaults to current directory.
    data_dir: Option<String>,
}

fn default_limit_standard() -> u32 {
    10
}

fn default_limit_elevated() -> u32 {
    100
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama2".to_string()
}

fn default_openai_model() -> String {
    "gpt-4".to_string()
}

fn default_anthropic_model() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

/// Immutable runtime configuration, passed down to each component at
/// construction. No component reads ambient global state.
#[derive(Debug, Clone)]
pub struct Config {
    pub default_backend: BackendKind,
    pub daily_limit_standard: u32,
    pub daily_limit_elevated: u32,
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub openai_api_key: String,
    pub openai_model: String,
    pub anthropic_api_key: String,
    pub anthropic_model: String,
    pub request_timeout_secs: u64,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        if file.daily_limit_standard == 0 {
            return Err(ConfigError::Validation("daily_limit_standard must be at least 1".into()));
        }
        if file.daily_limit_elevated < file.daily_limit_standard {
            return Err(ConfigError::Validation(
                "daily_limit_elevated must not be lower than daily_limit_standard".into(),
            ));
        }
        if !file.ollama_base_url.starts_with("http://") && !file.ollama_base_url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "ollama_base_url '{}' is not an http(s) URL",
                file.ollama_base_url
            )));
        }
        // Credentials for the configured default must be present up front, not
        // discovered on the first chat turn.
        match file.default_backend {
            BackendKind::OpenAi if file.openai_api_key.is_empty() => {
                return Err(ConfigError::Validation(
                    "default_backend is 'openai' but openai_api_key is empty".into(),
                ));
            }
            BackendKind::Anthropic if file.anthropic_api_key.is_empty() => {
                return Err(ConfigError::Validation(
                    "default_backend is 'anthropic' but anthropic_api_key is empty".into(),
                ));
            }
            _ => {}
        }
        if file.request_timeout_secs == 0 {
            return Err(ConfigError::Validation("request_timeout_secs must be at least 1".into()));
        }

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            default_backend: file.default_backend,
            daily_limit_standard: file.daily_limit_standard,
            daily_limit_elevated: file.daily_limit_elevated,
            ollama_base_url: file.ollama_base_url.trim_end_matches('/').to_string(),
            ollama_model: file.ollama_model,
            openai_api_key: file.openai_api_key,
            openai_model: file.openai_model,
            anthropic_api_key: file.anthropic_api_key,
            anthropic_model: file.anthropic_model,
            request_timeout_secs: file.request_timeout_secs,
            data_dir,
        })
    }
}
