use async_stream::stream;
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::sse::{Event, KeepAlive, Sse},
    routing::post,
    Router,
};
use futures::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::chat::ChatMeta;
use crate::models::{AppState, ChatRequest};
use crate::settings::{ProvidersConfig, PROVIDERS_HEADER};
use crate::types::{AppError, AppResult};

pub fn router() -> Router<AppState> {
    Router::new().route("/api/chat", post(post_chat))
}

/// Stream an answer about the dataset.
///
/// Validation, dataset and model errors are returned as JSON before any
/// byte of the stream is sent. Once streaming, failures arrive as an
/// `error` event and a clean finish as a `done` event carrying the request
/// metadata.
pub async fn post_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let budget = state.config.server.request_timeout_secs;
    let deadline = Instant::now() + Duration::from_secs(budget);

    let input = ChatRequest::from_slice(&body)?.into_input(header_providers(&headers))?;

    let response = tokio::time::timeout_at(deadline, state.chat_service().handle(input))
        .await
        .map_err(|_| AppError::Timeout(budget))??;

    let meta = response.meta;
    let mut chunks = response.chunks;
    info!(request_id = %meta.request_id, provider = %meta.provider, model = %meta.model, "Streaming chat response");

    let events = stream! {
        let expired = tokio::time::sleep_until(deadline);
        tokio::pin!(expired);

        loop {
            let next = tokio::select! {
                _ = &mut expired => None,
                item = chunks.next() => Some(item),
            };

            match next {
                Some(Some(Ok(text))) => yield Ok(Event::default().data(normalize_newlines(&text))),
                Some(Some(Err(e))) => {
                    yield Ok(error_event(&e));
                    break;
                }
                Some(None) => {
                    yield Ok(done_event(&meta));
                    break;
                }
                None => {
                    warn!(request_id = %meta.request_id, budget_secs = budget, "Chat stream cut off at deadline");
                    yield Ok(error_event(&AppError::Timeout(budget)));
                    break;
                }
            }
        }
    };

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn header_providers(headers: &HeaderMap) -> Option<ProvidersConfig> {
    let raw = headers.get(PROVIDERS_HEADER)?;
    match raw.to_str() {
        Ok(raw) => ProvidersConfig::from_header(raw),
        Err(e) => {
            warn!(error = %e, "Ignoring non-ASCII {} header", PROVIDERS_HEADER);
            None
        }
    }
}

fn error_event(error: &AppError) -> Event {
    let payload = serde_json::json!({
        "error": error.public_message(),
        "code": error.code(),
    });
    Event::default().event("error").data(payload.to_string())
}

fn done_event(meta: &ChatMeta) -> Event {
    let payload = serde_json::to_string(meta).unwrap_or_else(|_| "{}".to_string());
    Event::default().event("done").data(payload)
}

// SSE framing splits data on line breaks; a bare carriage return is not allowed.
fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_newlines() {
        assert_eq!(normalize_newlines("a\r\nb\rc\nd"), "a\nb\nc\nd");
    }

    #[test]
    fn test_invalid_header_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(PROVIDERS_HEADER, "{not json".parse().unwrap());
        assert!(header_providers(&headers).is_none());

        headers.insert(PROVIDERS_HEADER, r#"{"openai":{"apiKey":"sk"}}"#.parse().unwrap());
        assert!(header_providers(&headers).is_some());
    }
}
