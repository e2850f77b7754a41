use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

use crate::settings::Provider;

/// Sampling temperature used for every model invocation.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
/// Upper bound on generated tokens per reply.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
/// Model used when the client does not select one.
pub const DEFAULT_MODEL: &str = "gpt-4o";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LLMConfig,
    pub dataset: DatasetConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
    /// Wall-clock budget for one request, measured from request entry
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    pub openai_api_key: String,
    pub anthropic_api_key: String,
    pub google_api_key: String,
    /// Allow server-side keys when the request carries none
    pub env_key_fallback: bool,
    pub default_model: String,
    pub require_model_selection: bool,
    pub temperature: f32,
    pub max_tokens: u32,
    pub openai_api_base: String,
    pub anthropic_api_base: String,
    pub google_api_base: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetConfig {
    pub default_path: Option<PathBuf>,
    pub default_url: Option<String>,
    /// Approximate context budget for the data section, in tokens
    pub prompt_token_budget: usize,
    pub chars_per_token: usize,
}

impl LLMConfig {
    /// Server-side key for a provider, if one is configured.
    pub fn env_api_key(&self, provider: Provider) -> Option<&str> {
        let key = match provider {
            Provider::OpenAI => &self.openai_api_key,
            Provider::Anthropic => &self.anthropic_api_key,
            Provider::Google => &self.google_api_key,
        };
        let key = key.trim();
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }

    pub fn api_base(&self, provider: Provider) -> &str {
        match provider {
            Provider::OpenAI => &self.openai_api_base,
            Provider::Anthropic => &self.anthropic_api_base,
            Provider::Google => &self.google_api_base,
        }
    }
}

impl DatasetConfig {
    /// Character budget for the serialized rows of the system prompt.
    pub fn char_budget(&self) -> usize {
        self.prompt_token_budget.saturating_mul(self.chars_per_token)
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let flag = |key: &str| -> Result<bool> {
            var(key, "false")
                .trim()
                .parse::<bool>()
                .with_context(|| format!("{} must be true or false", key))
        };

        Ok(Self {
            server: ServerConfig {
                port: var("PORT", "3000")
                    .parse()
                    .context("PORT must be a valid port number")?,
                host: var("HOST", "0.0.0.0"),
                cors_allowed_origins: var("ALLOWED_ORIGINS", "http://localhost:3000,http://localhost:5173")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                request_timeout_secs: var("REQUEST_TIMEOUT_SECS", "30")
                    .parse()
                    .context("REQUEST_TIMEOUT_SECS must be a number of seconds")?,
            },
            llm: LLMConfig {
                openai_api_key: lookup("OPENAI_API_KEY").unwrap_or_default(),
                anthropic_api_key: lookup("ANTHROPIC_API_KEY").unwrap_or_default(),
                google_api_key: lookup("GOOGLE_API_KEY").unwrap_or_default(),
                env_key_fallback: flag("LLM_ENV_KEY_FALLBACK")?,
                default_model: var("DEFAULT_MODEL", DEFAULT_MODEL),
                require_model_selection: flag("REQUIRE_MODEL_SELECTION")?,
                temperature: var("LLM_TEMPERATURE", &DEFAULT_TEMPERATURE.to_string())
                    .parse()
                    .context("LLM_TEMPERATURE must be a number")?,
                max_tokens: var("LLM_MAX_TOKENS", &DEFAULT_MAX_TOKENS.to_string())
                    .parse()
                    .context("LLM_MAX_TOKENS must be a positive integer")?,
                openai_api_base: var("OPENAI_API_BASE", "https://api.openai.com"),
                anthropic_api_base: var("ANTHROPIC_API_BASE", "https://api.anthropic.com"),
                google_api_base: var("GOOGLE_API_BASE", "https://generativelanguage.googleapis.com"),
            },
            dataset: DatasetConfig {
                default_path: lookup("DEFAULT_DATASET_PATH")
                    .filter(|p| !p.trim().is_empty())
                    .map(PathBuf::from),
                default_url: lookup("DEFAULT_DATASET_URL").filter(|u| !u.trim().is_empty()),
                prompt_token_budget: var("PROMPT_TOKEN_BUDGET", "120000")
                    .parse()
                    .context("PROMPT_TOKEN_BUDGET must be a positive integer")?,
                chars_per_token: var("CHARS_PER_TOKEN", "4")
                    .parse()
                    .context("CHARS_PER_TOKEN must be a positive integer")?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.request_timeout_secs, 30);
        assert_eq!(config.llm.default_model, "gpt-4o");
        assert!(!config.llm.env_key_fallback);
        assert!(!config.llm.require_model_selection);
        assert_eq!(config.llm.max_tokens, 1000);
        assert_eq!(config.dataset.char_budget(), 480_000);
        assert!(config.dataset.default_path.is_none());
    }

    #[test]
    fn test_env_api_key_ignores_blank_values() {
        let config = config_from(&[("OPENAI_API_KEY", "sk-live"), ("GOOGLE_API_KEY", "   ")]).unwrap();
        assert_eq!(config.llm.env_api_key(Provider::OpenAI), Some("sk-live"));
        assert_eq!(config.llm.env_api_key(Provider::Google), None);
        assert_eq!(config.llm.env_api_key(Provider::Anthropic), None);
    }

    #[test]
    fn test_invalid_flag_is_rejected() {
        assert!(config_from(&[("LLM_ENV_KEY_FALLBACK", "sometimes")]).is_err());
        assert!(config_from(&[("PORT", "not-a-port")]).is_err());
    }

    #[test]
    fn test_allowed_origins_are_split() {
        let config = config_from(&[("ALLOWED_ORIGINS", "https://a.example, https://b.example,")]).unwrap();
        assert_eq!(
            config.server.cors_allowed_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }
}
