// Google Gemini adapter (streaming)

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::llm::provider::{ensure_success, stream_error, transport_error, LLMAdapter, TokenStream};
use crate::llm::sse;
use crate::settings::Provider;
use crate::types::{AppResult, LLMRequest, Role};

pub struct GoogleAdapter {
    client: Client,
    api_key: String,
    api_base: String,
}

impl GoogleAdapter {
    pub fn new(client: Client, api_key: &str, api_base: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn build_body(request: &LLMRequest) -> Value {
        let contents: Vec<Value> = request
            .messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                };
                json!({ "role": role, "parts": [{ "text": m.text() }] })
            })
            .collect();

        let mut generation_config = json!({});
        if let Some(t) = request.temperature {
            generation_config["temperature"] = json!(t);
        }
        if let Some(max) = request.max_tokens {
            generation_config["maxOutputTokens"] = json!(max);
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": generation_config,
        });
        if let Some(system) = &request.system_instruction {
            body["system_instruction"] = json!({ "parts": [{ "text": system }] });
        }
        body
    }

    fn model_path(model: &str) -> &str {
        model.strip_prefix("models/").unwrap_or(model)
    }
}

fn parse_chunk(data: &str) -> AppResult<Option<String>> {
    let Ok(event) = serde_json::from_str::<Value>(data) else {
        debug!(data = %data, "Skipping unparseable Gemini stream event");
        return Ok(None);
    };
    if let Some(err) = stream_error(Provider::Google, &event) {
        return Err(err);
    }

    let text = event
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect::<String>()
        })
        .unwrap_or_default();

    Ok(if text.is_empty() { None } else { Some(text) })
}

#[async_trait]
impl LLMAdapter for GoogleAdapter {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    async fn create_chat_completion_stream(&self, request: &LLMRequest) -> AppResult<TokenStream> {
        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent",
            self.api_base,
            Self::model_path(&request.model)
        );

        let response = self
            .client
            .post(&url)
            .query(&[("alt", "sse"), ("key", self.api_key.as_str())])
            .json(&Self::build_body(request))
            .send()
            .await
            .map_err(|e| transport_error(Provider::Google, e))?;
        let response = ensure_success(Provider::Google, response).await?;

        let events = sse::data_events(response.bytes_stream());
        let stream = try_stream! {
            let mut events = Box::pin(events);
            while let Some(data) = events.next().await {
                if let Some(text) = parse_chunk(&data?)? {
                    yield text;
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
    fn test_build_body_maps_roles() {
        let request = LLMRequest {
            provider: Provider::Google,
            model: "gemini-1.5-flash".to_string(),
            system_instruction: Some("sys".to_string()),
            messages: vec![ChatMessage::user("q"), ChatMessage::assistant("a")],
            max_tokens: Some(1000),
            temperature: Some(0.7),
        };
        let body = GoogleAdapter::build_body(&request);
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["system_instruction"]["parts"][0]["text"], "sys");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1000);
    }

    #[test]
    fn test_model_path() {
        assert_eq!(GoogleAdapter::model_path("models/gemini-pro"), "gemini-pro");
        assert_eq!(GoogleAdapter::model_path("gemini-pro"), "gemini-pro");
    }

    #[test]
    fn test_parse_chunk() {
        let data = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hel"},{"text":"lo"}]}}]}"#;
        assert_eq!(parse_chunk(data).unwrap(), Some("Hello".to_string()));
        assert_eq!(parse_chunk(r#"{"usageMetadata":{}}"#).unwrap(), None);
        assert!(parse_chunk(r#"{"error":{"code":500,"message":"internal"}}"#).is_err());
    }
}
