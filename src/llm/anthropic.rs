// Anthropic messages adapter (streaming)

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::llm::provider::{ensure_success, stream_error, transport_error, LLMAdapter, TokenStream};
use crate::llm::sse;
use crate::settings::Provider;
use crate::types::{AppResult, LLMRequest};

const ANTHROPIC_VERSION: &str = "2023-06-01";
// The messages API requires max_tokens on every request
const FALLBACK_MAX_TOKENS: u32 = 1024;

pub struct AnthropicAdapter {
    client: Client,
    api_key: String,
    api_base: String,
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<AnthropicContent>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum AnthropicContent {
    Text { text: String },
}

/// What a streamed event means for the caller
#[derive(Debug, PartialEq)]
enum StreamEvent {
    Text(String),
    Stop,
    Ignore,
}

impl AnthropicAdapter {
    pub fn new(client: Client, api_key: &str, api_base: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn build_request(request: &LLMRequest) -> AnthropicRequest {
        AnthropicRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens.unwrap_or(FALLBACK_MAX_TOKENS),
            system: request.system_instruction.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| AnthropicMessage {
                    role: m.role.as_str(),
                    content: vec![AnthropicContent::Text { text: m.text() }],
                })
                .collect(),
            temperature: request.temperature,
            stream: true,
        }
    }
}

fn parse_event(data: &str) -> AppResult<StreamEvent> {
    let Ok(event) = serde_json::from_str::<Value>(data) else {
        debug!(data = %data, "Skipping unparseable Anthropic stream event");
        return Ok(StreamEvent::Ignore);
    };
    if let Some(err) = stream_error(Provider::Anthropic, &event) {
        return Err(err);
    }

    match event.get("type").and_then(|t| t.as_str()) {
        Some("content_block_delta") => Ok(event
            .get("delta")
            .and_then(|d| d.get("text"))
            .and_then(|t| t.as_str())
            .filter(|t| !t.is_empty())
            .map(|t| StreamEvent::Text(t.to_string()))
            .unwrap_or(StreamEvent::Ignore)),
        Some("message_stop") => Ok(StreamEvent::Stop),
        _ => Ok(StreamEvent::Ignore),
    }
}

#[async_trait]
impl LLMAdapter for AnthropicAdapter {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn create_chat_completion_stream(&self, request: &LLMRequest) -> AppResult<TokenStream> {
        let url = format!("{}/v1/messages", self.api_base);
        let body = Self::build_request(request);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(Provider::Anthropic, e))?;
        let response = ensure_success(Provider::Anthropic, response).await?;

        let events = sse::data_events(response.bytes_stream());
        let stream = try_stream! {
            let mut events = Box::pin(events);
            while let Some(data) = events.next().await {
                match parse_event(&data?)? {
                    StreamEvent::Text(text) => {
                        yield text;
                    }
                    StreamEvent::Stop => break,
                    StreamEvent::Ignore => {}
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;

    #[test]
    fn test_system_prompt_is_top_level() {
        let request = LLMRequest {
            provider: Provider::Anthropic,
            model: "claude-3-haiku-20240307".to_string(),
            system_instruction: Some("dataset prompt".to_string()),
            messages: vec![ChatMessage::user("How many rows?")],
            max_tokens: None,
            temperature: Some(0.7),
        };
        let body = serde_json::to_value(AnthropicAdapter::build_request(&request)).unwrap();
        assert_eq!(body["system"], "dataset prompt");
        assert_eq!(body["max_tokens"], 1024);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"][0]["type"], "text");
        assert_eq!(body["messages"][0]["content"][0]["text"], "How many rows?");
    }

    #[test]
    fn test_parse_event() {
        assert_eq!(
            parse_event(r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#).unwrap(),
            StreamEvent::Text("Hi".to_string())
        );
        assert_eq!(parse_event(r#"{"type":"message_stop"}"#).unwrap(), StreamEvent::Stop);
        assert_eq!(parse_event(r#"{"type":"ping"}"#).unwrap(), StreamEvent::Ignore);
        assert!(parse_event(r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#).is_err());
    }
}
