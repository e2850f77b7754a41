//! Chat request handling.
//!
//! Resolves the dataset, builds the system prompt, picks the provider and
//! key for the selected model and hands back the provider's token stream.
//! Stateless across requests apart from the shared default dataset.

pub mod lifecycle;

pub use lifecycle::{ChatPhase, RequestLifecycle};

use async_stream::stream;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::dataset::{Dataset, DefaultDataset};
use crate::llm::{AdapterFactory, TokenStream};
use crate::prompt::{build_system_prompt, SystemPrompt};
use crate::settings::{Provider, ProvidersConfig};
use crate::types::{AppError, AppResult, ChatMessage, LLMRequest};

/// Validated input of one chat request
#[derive(Debug, Clone)]
pub struct ChatInput {
    pub messages: Vec<ChatMessage>,
    pub selected_model: Option<String>,
    pub uploaded_csv: Option<String>,
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetOrigin {
    Uploaded,
    Default,
}

/// Provider, model and key chosen for a request
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedModel {
    pub provider: Provider,
    pub model: String,
    pub api_key: String,
}

/// What the request resolved to, sent ahead of the tokens
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChatMeta {
    pub request_id: Uuid,
    pub provider: Provider,
    pub model: String,
    pub dataset: DatasetOrigin,
    pub total_rows: usize,
    pub included_rows: usize,
}

pub struct ChatStream {
    pub meta: ChatMeta,
    pub chunks: TokenStream,
}

#[derive(Clone)]
pub struct ChatService {
    config: Arc<Config>,
    default_dataset: DefaultDataset,
    adapters: Arc<dyn AdapterFactory>,
}

impl ChatService {
    pub fn new(config: Arc<Config>, default_dataset: DefaultDataset, adapters: Arc<dyn AdapterFactory>) -> Self {
        Self {
            config,
            default_dataset,
            adapters,
        }
    }

    pub async fn handle(&self, input: ChatInput) -> AppResult<ChatStream> {
        let mut lifecycle = RequestLifecycle::start();
        info!(
            request_id = %lifecycle.id(),
            messages = input.messages.len(),
            uploaded = input.uploaded_csv.is_some(),
            model = ?input.selected_model,
            "Chat request received"
        );

        let resolved = self.resolve_dataset(input.uploaded_csv.as_deref()).await;
        let (dataset, origin) = lifecycle.step(ChatPhase::DatasetResolved, resolved)?;

        let prompt = self.system_prompt(&dataset);
        lifecycle.advance(ChatPhase::PromptBuilt);
        debug!(
            request_id = %lifecycle.id(),
            total_rows = prompt.total_rows,
            included_rows = prompt.included_rows,
            prompt_chars = prompt.text.len(),
            "System prompt built"
        );

        let resolved = self.resolve_model(input.selected_model.as_deref(), &input.providers);
        let model = lifecycle.step(ChatPhase::ModelResolved, resolved)?;

        let request = LLMRequest {
            provider: model.provider,
            model: model.model.clone(),
            system_instruction: Some(prompt.text),
            messages: input.messages,
            max_tokens: Some(self.config.llm.max_tokens),
            temperature: Some(self.config.llm.temperature),
        };
        let adapter = self.adapters.create(model.provider, &model.api_key);
        if adapter.provider() != model.provider {
            return Err(lifecycle.fail(AppError::Internal(format!(
                "adapter for {} was asked to serve {}",
                adapter.provider(),
                model.provider
            ))));
        }
        lifecycle.advance(ChatPhase::Dispatched);
        info!(request_id = %lifecycle.id(), provider = %model.provider, model = %model.model, "Dispatching to provider");

        let dispatched = adapter.create_chat_completion_stream(&request).await;
        let chunks = lifecycle.step(ChatPhase::Streaming, dispatched)?;

        let meta = ChatMeta {
            request_id: lifecycle.id(),
            provider: model.provider,
            model: model.model,
            dataset: origin,
            total_rows: prompt.total_rows,
            included_rows: prompt.included_rows,
        };

        Ok(ChatStream {
            meta,
            chunks: track(lifecycle, chunks),
        })
    }

    /// The uploaded dataset if one was sent, otherwise the shared default.
    pub async fn resolve_dataset(&self, uploaded: Option<&str>) -> AppResult<(Arc<Dataset>, DatasetOrigin)> {
        match uploaded {
            Some(text) => {
                let dataset = Dataset::from_upload(text)?;
                Ok((Arc::new(dataset), DatasetOrigin::Uploaded))
            }
            None => Ok((self.default_dataset.get().await, DatasetOrigin::Default)),
        }
    }

    pub fn system_prompt(&self, dataset: &Dataset) -> SystemPrompt {
        build_system_prompt(dataset, self.config.dataset.char_budget())
    }

    pub fn resolve_model(&self, selected: Option<&str>, providers: &ProvidersConfig) -> AppResult<ResolvedModel> {
        let llm = &self.config.llm;
        let model = match selected.map(str::trim).filter(|m| !m.is_empty()) {
            Some(model) => model.to_string(),
            None if llm.require_model_selection => {
                return Err(AppError::InvalidRequest(
                    "selectedModel is required. Choose a model in settings.".to_string(),
                ))
            }
            None => llm.default_model.clone(),
        };

        let provider = providers
            .provider_for_model(&model)
            .or_else(|| Provider::classify(&model))
            .ok_or_else(|| {
                AppError::ModelSelection(format!(
                    "Unknown model '{}': it does not belong to OpenAI, Google or Anthropic.",
                    model
                ))
            })?;

        let api_key = providers
            .api_key(provider)
            .or_else(|| {
                if llm.env_key_fallback {
                    llm.env_api_key(provider)
                } else {
                    None
                }
            })
            .ok_or(AppError::MissingApiKey(provider))?;

        Ok(ResolvedModel {
            provider,
            model,
            api_key: api_key.to_string(),
        })
    }
}

/// Relay provider chunks while recording how the request ends.
fn track(mut lifecycle: RequestLifecycle, chunks: TokenStream) -> TokenStream {
    let tracked = stream! {
        let mut chunks = chunks;
        while let Some(item) = chunks.next().await {
            match item {
                Ok(text) => {
                    lifecycle.record_chunk(&text);
                    yield Ok(text);
                }
                Err(e) => {
                    let e = lifecycle.fail(e);
                    yield Err(e);
                    break;
                }
            }
        }
        lifecycle.complete();
    };
    Box::pin(tracked)
}
