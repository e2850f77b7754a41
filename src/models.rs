use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::chat::{ChatInput, ChatService};
use crate::config::Config;
use crate::dataset::DefaultDataset;
use crate::llm::AdapterFactory;
use crate::settings::ProvidersConfig;
use crate::types::{AppError, AppResult, ChatMessage};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub default_dataset: DefaultDataset,
    pub adapters: Arc<dyn AdapterFactory>,
}

impl AppState {
    pub fn new(config: Config, default_dataset: DefaultDataset, adapters: Arc<dyn AdapterFactory>) -> Self {
        Self {
            config: Arc::new(config),
            default_dataset,
            adapters,
        }
    }

    pub fn chat_service(&self) -> ChatService {
        ChatService::new(self.config.clone(), self.default_dataset.clone(), self.adapters.clone())
    }
}

/// Body of `POST /api/chat` as received. Every field is checked in
/// [`ChatRequest::into_input`] so that errors can name what is wrong.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Option<Value>,
    #[serde(default)]
    pub selected_model: Option<Value>,
    #[serde(default)]
    pub uploaded_csv_data: Option<Value>,
    #[serde(default)]
    pub providers: Option<Value>,
}

impl ChatRequest {
    pub fn from_slice(body: &[u8]) -> AppResult<Self> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| AppError::InvalidRequest(format!("Request body is not valid JSON: {}", e)))?;
        if !value.is_object() {
            return Err(AppError::InvalidRequest("Request body must be a JSON object".to_string()));
        }
        serde_json::from_value(value).map_err(|e| AppError::InvalidRequest(e.to_string()))
    }

    /// Validate the request. `header_providers` is used only when the body
    /// carries no `providers`.
    pub fn into_input(self, header_providers: Option<ProvidersConfig>) -> AppResult<ChatInput> {
        let messages = match self.messages {
            Some(Value::Array(items)) => parse_messages(items)?,
            _ => return Err(AppError::InvalidRequest("messages array required".to_string())),
        };

        let selected_model = optional_string(self.selected_model, "selectedModel")?;
        let uploaded_csv = optional_string(self.uploaded_csv_data, "uploadedCsvData")?;

        let providers = match self.providers {
            Some(value) if !value.is_null() => ProvidersConfig::from_value(value)?,
            _ => header_providers.unwrap_or_default(),
        };

        Ok(ChatInput {
            messages,
            selected_model,
            uploaded_csv,
            providers,
        })
    }
}

fn parse_messages(items: Vec<Value>) -> AppResult<Vec<ChatMessage>> {
    if items.is_empty() {
        return Err(AppError::InvalidRequest("messages must not be empty".to_string()));
    }

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let message: ChatMessage = serde_json::from_value(item)
                .map_err(|e| AppError::InvalidRequest(format!("messages[{}] is invalid: {}", index, e)))?;
            if !message.has_content() {
                return Err(AppError::InvalidRequest(format!(
                    "messages[{}] has no text content",
                    index
                )));
            }
            Ok(message)
        })
        .collect()
}

fn optional_string(value: Option<Value>, field: &str) -> AppResult<Option<String>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(AppError::InvalidRequest(format!("{} must be a string", field))),
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub default_dataset_loaded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Provider;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    fn request(value: Value) -> ChatRequest {
        ChatRequest::from_slice(value.to_string().as_bytes()).unwrap()
    }

    #[test]
    fn test_missing_messages() {
        let err = request(json!({ "selectedModel": "gpt-4o" })).into_input(None).unwrap_err();
        assert!(err.public_message().contains("messages array required"));

        let err = request(json!({ "messages": "hi" })).into_input(None).unwrap_err();
        assert!(err.public_message().contains("messages array required"));
    }

    #[test]
    fn test_bad_message_names_index() {
        let err = request(json!({
            "messages": [
                { "role": "user", "content": "hi" },
                { "role": "robot", "content": "beep" }
            ]
        }))
        .into_input(None)
        .unwrap_err();
        assert!(err.public_message().contains("messages[1]"), "{}", err.public_message());
    }

    #[test]
    fn test_message_without_text_names_index() {
        let err = request(json!({
            "messages": [
                { "role": "user", "content": "hi" },
                { "role": "assistant", "parts": [{ "type": "step-start" }] }
            ]
        }))
        .into_input(None)
        .unwrap_err();
        assert_eq!(err.code(), "invalid_request");
        assert!(err.public_message().contains("messages[1]"), "{}", err.public_message());
    }

    #[test]
    fn test_malformed_body() {
        assert!(matches!(ChatRequest::from_slice(b"{not json"), Err(AppError::InvalidRequest(_))));
        assert!(matches!(ChatRequest::from_slice(b"[1,2]"), Err(AppError::InvalidRequest(_))));
    }

    #[test]
    fn test_empty_upload_is_kept() {
        let input = assert_ok!(request(json!({
            "messages": [{ "role": "user", "content": "hi" }],
            "uploadedCsvData": ""
        }))
        .into_input(None));
        assert_eq!(input.uploaded_csv.as_deref(), Some(""));

        let input = assert_ok!(request(json!({
            "messages": [{ "role": "user", "content": "hi" }],
            "uploadedCsvData": null
        }))
        .into_input(None));
        assert_eq!(input.uploaded_csv, None);

        assert_err!(request(json!({
            "messages": [{ "role": "user", "content": "hi" }],
            "uploadedCsvData": 42
        }))
        .into_input(None));
    }

    #[test]
    fn test_body_providers_win_over_header() {
        let header = ProvidersConfig::from_value(json!({ "google": { "apiKey": "from-header" } })).unwrap();

        let input = request(json!({
            "messages": [{ "role": "user", "content": "hi" }],
            "providers": { "openai": { "apiKey": "from-body" } }
        }))
        .into_input(Some(header.clone()))
        .unwrap();
        assert_eq!(input.providers.api_key(Provider::OpenAI), Some("from-body"));
        assert_eq!(input.providers.api_key(Provider::Google), None);

        let input = request(json!({ "messages": [{ "role": "user", "content": "hi" }] }))
            .into_input(Some(header))
            .unwrap();
        assert_eq!(input.providers.api_key(Provider::Google), Some("from-header"));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = request(json!({
            "messages": [{ "role": "user", "content": "hi" }],
            "providers": { "mistral": { "apiKey": "x" } }
        }))
        .into_input(None)
        .unwrap_err();
        assert_eq!(err.code(), "invalid_request");
    }
}
