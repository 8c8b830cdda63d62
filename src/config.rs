// The `config` module builds the application configuration once at startup.

use crate::retry::RetryConfig;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Default location of the OAuth client secret downloaded from Google Cloud.
pub const DEFAULT_CREDENTIALS_PATH: &str = "./tmp/credential.json";
/// Default location where the OAuth token is persisted.
pub const DEFAULT_TOKEN_PATH: &str = "./tmp/token.json";
/// Default ceiling on model round-trips per agent run.
pub const DEFAULT_MAX_STEPS: usize = 10;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Missing API key: set {0}")]
    MissingApiKey(&'static str),
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("Unknown model provider: {0:?} (expected \"gemini\" or \"openai\")")]
    UnknownProvider(String),
}

/// The hosted model vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelProvider {
    Gemini,
    OpenAI,
}

impl ModelProvider {
    /// Environment variable holding the API key for this provider.
    pub fn api_key_var(self) -> &'static str {
        match self {
            ModelProvider::Gemini => "GEMINI_API_KEY",
            ModelProvider::OpenAI => "OPENAI_API_KEY",
        }
    }

    /// Model used when `FORGEMAIL_MODEL` is not set.
    pub fn default_model(self) -> &'static str {
        match self {
            ModelProvider::Gemini => "gemini-2.0-flash-lite",
            ModelProvider::OpenAI => "gpt-4o-mini",
        }
    }
}

impl FromStr for ModelProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(ModelProvider::Gemini),
            "openai" => Ok(ModelProvider::OpenAI),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

/// Settings of the hosted language model.
#[derive(Clone)]
pub struct ModelConfig {
    pub provider: ModelProvider,
    pub model: String,
    pub api_key: String,
    pub temperature: f64,
    pub max_tokens: u64,
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Where the Gmail credentials live.
#[derive(Clone)]
pub struct AuthConfig {
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
    /// A pre-issued bearer token. When set, the interactive OAuth flow is skipped.
    pub access_token: Option<String>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("credentials_path", &self.credentials_path)
            .field("token_path", &self.token_path)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Application configuration, constructed once and passed explicitly to
/// every component.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub auth: AuthConfig,
    pub model: ModelConfig,
    pub max_steps: usize,
    pub retry: RetryConfig,
}

impl AppConfig {
    /// Reads the configuration from the process environment.
    ///
    /// Call `dotenv::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider = match get("FORGEMAIL_PROVIDER") {
            Some(value) => value.parse()?,
            None => ModelProvider::Gemini,
        };
        let api_key = get(provider.api_key_var())
            .ok_or(ConfigError::MissingApiKey(provider.api_key_var()))?;

        let model = ModelConfig {
            provider,
            model: get("FORGEMAIL_MODEL").unwrap_or_else(|| provider.default_model().to_string()),
            api_key,
            temperature: parse_or(&get, "FORGEMAIL_TEMPERATURE", 0.0)?,
            max_tokens: parse_or(&get, "FORGEMAIL_MAX_TOKENS", 1000)?,
        };

        let auth = AuthConfig {
            credentials_path: get("FORGEMAIL_CREDENTIALS_PATH")
                .unwrap_or_else(|| DEFAULT_CREDENTIALS_PATH.to_string())
                .into(),
            token_path: get("FORGEMAIL_TOKEN_PATH")
                .unwrap_or_else(|| DEFAULT_TOKEN_PATH.to_string())
                .into(),
            access_token: get("FORGEMAIL_ACCESS_TOKEN"),
        };

        let max_steps = parse_or(&get, "FORGEMAIL_MAX_STEPS", DEFAULT_MAX_STEPS)?;
        if max_steps == 0 {
            return Err(ConfigError::InvalidValue {
                key: "FORGEMAIL_MAX_STEPS",
                value: "0".to_string(),
            });
        }

        let retry = RetryConfig {
            max_attempts: parse_or(&get, "FORGEMAIL_RETRY_ATTEMPTS", 3)?,
            ..RetryConfig::default()
        }
        .retry_all_errors();

        Ok(AppConfig {
            auth,
            model,
            max_steps,
            retry,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}
