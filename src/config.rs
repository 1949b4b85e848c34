//! Resolver configuration
//!
//! Values come from builder calls or from `OPENAPI_INTENT_*` environment
//! variables; the CLI layers its flags on top of the environment.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::IntentError;

pub const PROVIDER_ENV: &str = "OPENAPI_INTENT_PROVIDER";
pub const MODEL_ENV: &str = "OPENAPI_INTENT_MODEL";
pub const MAX_TOKENS_ENV: &str = "OPENAPI_INTENT_MAX_TOKENS";
pub const TIMEOUT_SECS_ENV: &str = "OPENAPI_INTENT_TIMEOUT_SECS";
pub const BASE_URL_ENV: &str = "OPENAPI_INTENT_BASE_URL";
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-latest";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Which completion API to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provider {
    /// Anthropic Messages API
    #[default]
    Anthropic,
    /// OpenAI-compatible chat completions (OpenAI, vLLM, Ollama)
    OpenAi,
}

impl Provider {
    pub fn default_model(self) -> &'static str {
        match self {
            Self::Anthropic => DEFAULT_ANTHROPIC_MODEL,
            Self::OpenAi => DEFAULT_OPENAI_MODEL,
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Anthropic => DEFAULT_ANTHROPIC_BASE_URL,
            Self::OpenAi => DEFAULT_OPENAI_BASE_URL,
        }
    }

    pub fn api_key_env(self) -> &'static str {
        match self {
            Self::Anthropic => ANTHROPIC_API_KEY_ENV,
            Self::OpenAi => OPENAI_API_KEY_ENV,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
        })
    }
}

impl FromStr for Provider {
    type Err = IntentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            other => Err(IntentError::Config {
                reason: format!("unknown provider {other:?} (expected anthropic or openai)"),
            }),
        }
    }
}

/// Settings for the completion call made by `IntentResolver`.
#[derive(Clone)]
#[non_exhaustive]
pub struct ResolverConfig {
    pub provider: Provider,
    pub model: String,
    /// Upper bound on output tokens requested from the model
    pub max_tokens: u32,
    /// `None` waits forever
    pub timeout: Option<Duration>,
    pub base_url: String,
    pub api_key: String,
}

// api_key stays out of Debug output.
impl fmt::Debug for ResolverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .field("base_url", &self.base_url)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "***" })
            .finish()
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::new(Provider::default())
    }
}

impl ResolverConfig {
    /// Defaults for `provider`, with no API key.
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            model: provider.default_model().to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            base_url: provider.default_base_url().to_string(),
            api_key: String::new(),
        }
    }

    /// Load from environment variables, falling back to defaults.
    ///
    /// The API key is read from the provider's variable (`ANTHROPIC_API_KEY`
    /// or `OPENAI_API_KEY`) but is not required here; see `validate`.
    pub fn from_env() -> Result<Self, IntentError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, IntentError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let provider = match get(PROVIDER_ENV) {
            Some(p) => p.parse()?,
            None => Provider::default(),
        };
        let mut config = Self::new(provider);

        if let Some(model) = get(MODEL_ENV) {
            config.model = model;
        }
        if let Some(v) = get(MAX_TOKENS_ENV) {
            config.max_tokens = v.parse().map_err(|_| IntentError::Config {
                reason: format!("invalid {MAX_TOKENS_ENV}={v:?} (expected a positive integer)"),
            })?;
        }
        if let Some(v) = get(TIMEOUT_SECS_ENV) {
            let secs: u64 = v.parse().map_err(|_| IntentError::Config {
                reason: format!("invalid {TIMEOUT_SECS_ENV}={v:?} (expected integer seconds; 0 disables)"),
            })?;
            config = config.timeout_secs(secs);
        }
        if let Some(url) = get(BASE_URL_ENV) {
            config.base_url = url;
        }
        if let Some(key) = get(provider.api_key_env()) {
            config.api_key = key;
        }

        Ok(config)
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the request timeout. `0` disables it.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = if secs == 0 {
            None
        } else {
            Some(Duration::from_secs(secs))
        };
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    /// Check that an HTTP completion client can be built from this config.
    pub fn validate(&self) -> Result<(), IntentError> {
        if self.api_key.trim().is_empty() {
            return Err(IntentError::Config {
                reason: format!(
                    "{} backend requires an API key (set {} or pass --api-key)",
                    self.provider,
                    self.provider.api_key_env()
                ),
            });
        }
        if self.max_tokens == 0 {
            return Err(IntentError::Config {
                reason: "max_tokens must be greater than zero".to_string(),
            });
        }
        if self.model.trim().is_empty() {
            return Err(IntentError::Config {
                reason: "model must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_for_anthropic() {
        let config = ResolverConfig::default();
        assert_eq!(config.provider, Provider::Anthropic);
        assert_eq!(config.model, DEFAULT_ANTHROPIC_MODEL);
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.base_url, DEFAULT_ANTHROPIC_BASE_URL);
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn from_lookup_reads_all_variables() {
        let config = ResolverConfig::from_lookup(lookup(&[
            (PROVIDER_ENV, "OpenAI"),
            (MODEL_ENV, "local-model"),
            (MAX_TOKENS_ENV, "256"),
            (TIMEOUT_SECS_ENV, "5"),
            (BASE_URL_ENV, "http://localhost:11434/v1"),
            (OPENAI_API_KEY_ENV, " sk-test "),
            (ANTHROPIC_API_KEY_ENV, "ignored"),
        ]))
        .unwrap();

        assert_eq!(config.provider, Provider::OpenAi);
        assert_eq!(config.model, "local-model");
        assert_eq!(config.max_tokens, 256);
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.base_url, "http://localhost:11434/v1");
        assert_eq!(config.api_key, "sk-test");
    }

    #[test]
    fn from_lookup_zero_timeout_disables_it() {
        let config = ResolverConfig::from_lookup(lookup(&[(TIMEOUT_SECS_ENV, "0")])).unwrap();
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn from_lookup_rejects_bad_numbers() {
        let err = ResolverConfig::from_lookup(lookup(&[(MAX_TOKENS_ENV, "lots")])).unwrap_err();
        assert!(err.to_string().contains(MAX_TOKENS_ENV));

        let err = ResolverConfig::from_lookup(lookup(&[(TIMEOUT_SECS_ENV, "-1")])).unwrap_err();
        assert!(err.to_string().contains(TIMEOUT_SECS_ENV));
    }

    #[test]
    fn from_lookup_rejects_unknown_provider() {
        let err = ResolverConfig::from_lookup(lookup(&[(PROVIDER_ENV, "cohere")])).unwrap_err();
        assert!(matches!(err, IntentError::Config { .. }));
    }

    #[test]
    fn validate_fails_when_api_key_missing() {
        let err = ResolverConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains(ANTHROPIC_API_KEY_ENV));
    }

    #[test]
    fn validate_rejects_zero_max_tokens() {
        let config = ResolverConfig::default().api_key("k").max_tokens(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_complete_config() {
        assert!(ResolverConfig::default().api_key("k").validate().is_ok());
    }

    #[test]
    fn debug_output_hides_api_key() {
        let config = ResolverConfig::default().api_key("super-secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("***"));
    }
}
