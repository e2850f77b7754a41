// OpenAI chat completions adapter (streaming)

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

pub struct OpenAIAdapter {
    client: Client,
    api_key: String,
    api_base: String,
}

#[derive(Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Serialize)]
struct OpenAIMessage {
    role: &'static str,
    content: String,
}

impl OpenAIAdapter {
    pub fn new(client: Client, api_key: &str, api_base: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn build_request(request: &LLMRequest) -> OpenAIChatRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system_instruction {
            messages.push(OpenAIMessage {
                role: "system",
                content: system.clone(),
            });
        }
        messages.extend(request.messages.iter().map(|m| OpenAIMessage {
            role: m.role.as_str(),
            content: m.text(),
        }));

        OpenAIChatRequest {
            model: request.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: true,
        }
    }
}

/// Text delta carried by one streamed chunk.
fn parse_delta(data: &str) -> AppResult<Option<String>> {
    let Ok(event) = serde_json::from_str::<Value>(data) else {
        debug!(data = %data, "Skipping unparseable OpenAI stream event");
        return Ok(None);
    };
    if let Some(err) = stream_error(Provider::OpenAI, &event) {
        return Err(err);
    }
    Ok(event
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|c| c.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string))
}

#[async_trait]
impl LLMAdapter for OpenAIAdapter {
    fn provider(&self) -> Provider {
        Provider::OpenAI
    }

    async fn create_chat_completion_stream(&self, request: &LLMRequest) -> AppResult<TokenStream> {
        let url = format!("{}/v1/chat/completions", self.api_base);
        let body = Self::build_request(request);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(Provider::OpenAI, e))?;
        let response = ensure_success(Provider::OpenAI, response).await?;

        let events = sse::data_events(response.bytes_stream());
        let stream = try_stream! {
            let mut events = Box::pin(events);
            while let Some(data) = events.next().await {
                let data = data?;
                if data.trim() == "[DONE]" {
                    break;
                }
                if let Some(delta) = parse_delta(&data)? {
                    yield delta;
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
    fn test_build_request_prepends_system_prompt() {
        let request = LLMRequest {
            provider: Provider::OpenAI,
            model: "gpt-4o".to_string(),
            system_instruction: Some("be brief".to_string()),
            messages: vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")],
            max_tokens: Some(1000),
            temperature: Some(0.7),
        };
        let body = serde_json::to_value(OpenAIAdapter::build_request(&request)).unwrap();
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "be brief");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][2]["content"], "hello");
    }

    #[test]
    fn test_parse_delta() {
        assert_eq!(
            parse_delta(r#"{"choices":[{"delta":{"content":"Hel"}}]}"#).unwrap(),
            Some("Hel".to_string())
        );
        assert_eq!(parse_delta(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap(), None);
        assert_eq!(parse_delta("not json").unwrap(), None);
        assert!(parse_delta(r#"{"error":{"message":"overloaded"}}"#).is_err());
    }
}
