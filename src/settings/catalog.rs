//! Built-in model catalog offered to the settings page.

use super::Provider;
use serde::{Deserialize, Serialize};

/// A model offered by a provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelDescriptor {
    pub id: String,
    pub name: String,
    /// Owning provider, when the client states it explicitly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
}

impl ModelDescriptor {
    fn new(id: &str, name: &str, provider: Provider) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            provider: Some(provider),
        }
    }
}

/// Models shipped with the client for each provider, in display order.
pub fn default_catalog(provider: Provider) -> Vec<ModelDescriptor> {
    match provider {
        Provider::OpenAI => vec![
            ModelDescriptor::new("gpt-4o", "GPT-4o", provider),
            ModelDescriptor::new("gpt-4o-mini", "GPT-4o Mini", provider),
            ModelDescriptor::new("gpt-4-turbo", "GPT-4 Turbo", provider),
            ModelDescriptor::new("gpt-3.5-turbo", "GPT-3.5 Turbo", provider),
        ],
        Provider::Google => vec![
            ModelDescriptor::new("gemini-1.5-pro", "Gemini 1.5 Pro", provider),
            ModelDescriptor::new("gemini-1.5-flash", "Gemini 1.5 Flash", provider),
            ModelDescriptor::new("gemini-pro", "Gemini Pro", provider),
        ],
        Provider::Anthropic => vec![
            ModelDescriptor::new("claude-3-5-sonnet-20241022", "Claude 3.5 Sonnet", provider),
            ModelDescriptor::new("claude-3-opus-20240229", "Claude 3 Opus", provider),
            ModelDescriptor::new("claude-3-haiku-20240307", "Claude 3 Haiku", provider),
        ],
    }
}
