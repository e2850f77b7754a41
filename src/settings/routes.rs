//! Provider catalog routes
//!
//! - GET /api/providers - List providers, their models and server key status

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use super::{default_catalog, KeyStatus, ModelDescriptor, Provider};
use crate::models::AppState;

#[derive(Debug, Serialize)]
pub struct ProviderInfo {
    pub id: Provider,
    pub name: &'static str,
    pub models: Vec<ModelDescriptor>,
    /// Status of the server-side fallback key (only meaningful when enabled)
    pub server_key: KeyStatus,
}

#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    pub default_model: String,
    pub env_key_fallback: bool,
    pub providers: Vec<ProviderInfo>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/providers", get(list_providers))
}

async fn list_providers(State(state): State<AppState>) -> Json<ProvidersResponse> {
    let llm = &state.config.llm;
    let providers = Provider::ALL
        .into_iter()
        .map(|provider| ProviderInfo {
            id: provider,
            name: provider.display_name(),
            models: default_catalog(provider),
            server_key: if llm.env_key_fallback {
                KeyStatus::from_key(llm.env_api_key(provider))
            } else {
                KeyStatus::from_key(None)
            },
        })
        .collect();

    Json(ProvidersResponse {
        default_model: llm.default_model.clone(),
        env_key_fallback: llm.env_key_fallback,
        providers,
    })
}
