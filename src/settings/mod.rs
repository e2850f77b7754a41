//! Provider Settings
//!
//! Per-request provider configuration supplied by the browser client:
//! which providers exist, which models they offer and the API key to use.
//! Nothing here is persisted server side.

pub mod catalog;
pub mod routes;

pub use catalog::{default_catalog, ModelDescriptor};
pub use routes::router;

use crate::types::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Header that may carry the provider configuration as JSON
pub const PROVIDERS_HEADER: &str = "x-ai-providers";

/// Supported LLM providers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAI,
    Anthropic,
    Google,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::OpenAI => write!(f, "openai"),
            Provider::Anthropic => write!(f, "anthropic"),
            Provider::Google => write!(f, "google"),
        }
    }
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::OpenAI, Provider::Google, Provider::Anthropic];

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "openai" => Some(Provider::OpenAI),
            "anthropic" => Some(Provider::Anthropic),
            "google" => Some(Provider::Google),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::OpenAI => "OpenAI",
            Provider::Anthropic => "Anthropic",
            Provider::Google => "Google",
        }
    }

    /// Infer the provider from a model identifier's naming convention.
    ///
    /// This is the only place that knows the naming rules; adding a provider
    /// means adding a variant and an arm here.
    pub fn classify(model_id: &str) -> Option<Self> {
        let id = model_id.trim().to_ascii_lowercase();
        if id.starts_with("gpt-")
            || id.starts_with("chatgpt-")
            || id.starts_with("o1")
            || id.starts_with("o3")
            || id.starts_with("o4")
        {
            Some(Provider::OpenAI)
        } else if id.starts_with("claude") {
            Some(Provider::Anthropic)
        } else if id.starts_with("gemini") || id.contains("/gemini") {
            Some(Provider::Google)
        } else {
            None
        }
    }
}

/// Configuration for one provider as sent by the client
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProviderSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Empty means "not configured"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default)]
    pub models: Vec<ModelDescriptor>,
}

impl ProviderSettings {
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

/// Validated provider configuration for a single request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvidersConfig {
    providers: BTreeMap<Provider, ProviderSettings>,
}

impl ProvidersConfig {
    /// Validate the loosely-typed `providers` value of a request.
    pub fn from_value(value: serde_json::Value) -> AppResult<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }

        let raw: BTreeMap<String, serde_json::Value> = serde_json::from_value(value)
            .map_err(|_| AppError::InvalidRequest("providers must be an object keyed by provider id".to_string()))?;

        let mut providers = BTreeMap::new();
        for (id, settings) in raw {
            let provider = Provider::from_id(&id).ok_or_else(|| {
                AppError::InvalidRequest(format!(
                    "unknown provider '{}' (expected one of openai, google, anthropic)",
                    id
                ))
            })?;
            let settings: ProviderSettings = serde_json::from_value(settings).map_err(|e| {
                AppError::InvalidRequest(format!("invalid configuration for provider '{}': {}", id, e))
            })?;
            providers.insert(provider, settings);
        }

        Ok(Self { providers })
    }

    /// Parse the providers header. Failures are logged and treated as absent.
    pub fn from_header(raw: &str) -> Option<Self> {
        let value = match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Ignoring unparseable {} header", PROVIDERS_HEADER);
                return None;
            }
        };

        match Self::from_value(value) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!(error = %e, "Ignoring invalid {} header", PROVIDERS_HEADER);
                None
            }
        }
    }

    pub fn get(&self, provider: Provider) -> Option<&ProviderSettings> {
        self.providers.get(&provider)
    }

    pub fn api_key(&self, provider: Provider) -> Option<&str> {
        self.get(provider).and_then(ProviderSettings::api_key)
    }

    /// Provider explicitly listing `model_id` in its model catalog, if any.
    pub fn provider_for_model(&self, model_id: &str) -> Option<Provider> {
        self.providers.iter().find_map(|(provider, settings)| {
            settings
                .models
                .iter()
                .find(|m| m.id == model_id)
                .map(|m| m.provider.unwrap_or(*provider))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Masked view of a key for display and logging
#[derive(Debug, Clone, Serialize)]
pub struct KeyStatus {
    pub has_key: bool,
    pub key_hint: Option<String>,
}

impl KeyStatus {
    pub fn from_key(key: Option<&str>) -> Self {
        match key {
            Some(key) if key.chars().count() > 4 => {
                let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
                Self {
                    has_key: true,
                    key_hint: Some(format!("••••{}", tail)),
                }
            }
            Some(_) => Self {
                has_key: true,
                key_hint: Some("••••".to_string()),
            },
            None => Self {
                has_key: false,
                key_hint: None,
            },
        }
    }
}
