// Type definitions and enums

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::dataset::DatasetError;
use crate::settings::Provider;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Typed part of a chat message. Only text carries meaning here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Unsupported,
}

/// Message content - plain text or a list of typed parts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    fn text(&self) -> Option<String> {
        match self {
            MessageContent::Text(s) => Some(s.clone()),
            MessageContent::Parts(parts) => join_text_parts(parts),
        }
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        MessageContent::Text(s.to_string())
    }
}

fn join_text_parts(parts: &[ContentPart]) -> Option<String> {
    let texts: Vec<&str> = parts
        .iter()
        .filter_map(|p| match p {
            ContentPart::Text { text } => Some(text.as_str()),
            ContentPart::Unsupported => None,
        })
        .collect();
    if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n"))
    }
}

/// One turn of the conversation as sent by the client.
///
/// Clients send either `parts` (typed parts) or `content` (string or parts).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<ContentPart>>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: None,
            parts: Some(vec![ContentPart::Text { text: text.into() }]),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            parts: Some(vec![ContentPart::Text { text: text.into() }]),
        }
    }

    /// Plain text of the message; `parts` wins over `content`.
    pub fn text(&self) -> String {
        self.parts
            .as_deref()
            .and_then(join_text_parts)
            .or_else(|| self.content.as_ref().and_then(MessageContent::text))
            .unwrap_or_default()
    }

    /// Whether the message carries any non-blank text.
    pub fn has_content(&self) -> bool {
        !self.text().trim().is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct LLMRequest {
    pub provider: Provider,
    pub model: String,
    pub system_instruction: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("Model selection error: {0}")]
    ModelSelection(String),

    #[error("No API key configured for {}. Add your {} API key in settings.", .0.display_name(), .0.display_name())]
    MissingApiKey(Provider),

    #[error("The {} API rejected the configured API key: {}", .0.display_name(), .1)]
    InvalidApiKey(Provider, String),

    #[error("LLM API error: {0}")]
    LLMApi(String),

    #[error("Request exceeded its {0}s time budget")]
    Timeout(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) | AppError::Dataset(_) | AppError::ModelSelection(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::MissingApiKey(_) | AppError::InvalidApiKey(..) => StatusCode::UNAUTHORIZED,
            AppError::LLMApi(_) | AppError::Timeout(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::Dataset(_) => "dataset_error",
            AppError::ModelSelection(_) => "model_selection",
            AppError::MissingApiKey(_) => "missing_api_key",
            AppError::InvalidApiKey(..) => "invalid_api_key",
            AppError::LLMApi(_) => "provider_error",
            AppError::Timeout(_) => "timeout",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Message safe to show to the end user. Server faults stay generic.
    pub fn public_message(&self) -> String {
        match self {
            AppError::InvalidRequest(msg) | AppError::ModelSelection(msg) => msg.clone(),
            AppError::Dataset(e) => e.to_string(),
            AppError::MissingApiKey(_) => self.to_string(),
            AppError::InvalidApiKey(provider, _) => format!(
                "The {} API rejected your API key. Check the key in settings.",
                provider.display_name()
            ),
            AppError::LLMApi(_) => "The model provider failed to respond. Please try again.".to_string(),
            AppError::Timeout(_) => "The request took too long and was stopped.".to_string(),
            AppError::Internal(_) => "Internal Server Error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, code = self.code(), "Request failed");
        }

        let body = serde_json::json!({
            "error": self.public_message(),
            "code": self.code(),
        });
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;
