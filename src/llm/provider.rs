use async_trait::async_trait;
use futures::stream::{BoxStream, TryStreamExt};
use reqwest::{Client, Response, StatusCode};
use tracing::warn;

use crate::config::LLMConfig;
use crate::settings::Provider;
use crate::types::{AppError, AppResult, LLMRequest};

/// Lazy, finite stream of generated text chunks. Dropping it releases the
/// underlying provider connection.
pub type TokenStream = BoxStream<'static, AppResult<String>>;

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    async fn create_chat_completion_stream(&self, request: &LLMRequest) -> AppResult<TokenStream>;

    /// Whole reply as one string, built from the streamed chunks.
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<String> {
        let stream = self.create_chat_completion_stream(request).await?;
        stream.try_collect::<Vec<String>>().await.map(|chunks| chunks.concat())
    }
}

/// Builds the adapter for a provider once its key has been resolved
pub trait AdapterFactory: Send + Sync {
    fn create(&self, provider: Provider, api_key: &str) -> Box<dyn LLMAdapter>;
}

/// Factory for the HTTP adapters, sharing one connection pool
pub struct HttpAdapterFactory {
    client: Client,
    config: LLMConfig,
}

impl HttpAdapterFactory {
    pub fn new(config: LLMConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

impl AdapterFactory for HttpAdapterFactory {
    fn create(&self, provider: Provider, api_key: &str) -> Box<dyn LLMAdapter> {
        let base = self.config.api_base(provider);
        match provider {
            Provider::OpenAI => Box::new(crate::llm::openai::OpenAIAdapter::new(self.client.clone(), api_key, base)),
            Provider::Anthropic => Box::new(crate::llm::anthropic::AnthropicAdapter::new(self.client.clone(), api_key, base)),
            Provider::Google => Box::new(crate::llm::google::GoogleAdapter::new(self.client.clone(), api_key, base)),
        }
    }
}

/// Map a non-success provider response to an error; pass others through.
pub(crate) async fn ensure_success(provider: Provider, response: Response) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!(provider = %provider, status = %status, body = %body, "Provider returned an error status");

    let rejected_key = status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || (status == StatusCode::BAD_REQUEST && body.contains("API_KEY_INVALID"));
    if rejected_key {
        return Err(AppError::InvalidApiKey(provider, format!("HTTP {}", status)));
    }

    Err(AppError::LLMApi(format!(
        "{} API error ({}): {}",
        provider.display_name(),
        status,
        body
    )))
}

/// Error object embedded in a streamed event, if the event carries one.
pub(crate) fn stream_error(provider: Provider, event: &serde_json::Value) -> Option<AppError> {
    let error = event.get("error")?;
    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string());
    Some(AppError::LLMApi(format!("{} stream error: {}", provider.display_name(), message)))
}

pub(crate) fn transport_error(provider: Provider, e: reqwest::Error) -> AppError {
    AppError::LLMApi(format!("{} request failed: {}", provider.display_name(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    struct FixedAdapter {
        chunks: Vec<AppResult<String>>,
    }

    #[async_trait]
    impl LLMAdapter for FixedAdapter {
        fn provider(&self) -> Provider {
            Provider::OpenAI
        }

        async fn create_chat_completion_stream(&self, _request: &LLMRequest) -> AppResult<TokenStream> {
            let chunks: Vec<AppResult<String>> = self
                .chunks
                .iter()
                .map(|c| match c {
                    Ok(text) => Ok(text.clone()),
                    Err(e) => Err(AppError::LLMApi(e.to_string())),
                })
                .collect();
            Ok(Box::pin(stream::iter(chunks)))
        }
    }

    fn request() -> LLMRequest {
        LLMRequest {
            provider: Provider::OpenAI,
            model: "gpt-4o".to_string(),
            system_instruction: None,
            messages: vec![crate::types::ChatMessage::user("hi")],
            max_tokens: None,
            temperature: None,
        }
    }

    #[tokio::test]
    async fn test_completion_joins_chunks() {
        let adapter = FixedAdapter {
            chunks: vec![Ok("Four ".to_string()), Ok("rows.".to_string())],
        };
        assert_eq!(adapter.create_chat_completion(&request()).await.unwrap(), "Four rows.");
    }

    #[tokio::test]
    async fn test_completion_surfaces_stream_error() {
        let adapter = FixedAdapter {
            chunks: vec![Ok("Four".to_string()), Err(AppError::LLMApi("reset".to_string()))],
        };
        assert!(matches!(
            adapter.create_chat_completion(&request()).await,
            Err(AppError::LLMApi(_))
        ));
    }

    #[test]
    fn test_factory_builds_adapter_for_each_provider() {
        let config = crate::config::Config::from_lookup(|_| None).unwrap();
        let factory = HttpAdapterFactory::new(config.llm);
        for provider in Provider::ALL {
            assert_eq!(factory.create(provider, "key").provider(), provider);
        }
    }
}
