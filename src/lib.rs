// Dataset Chat - stream answers about a CSV dataset from OpenAI, Google or Anthropic models

pub mod chat;
pub mod config;
pub mod dataset;
pub mod llm;
pub mod middleware;
pub mod models;
pub mod prompt;
pub mod routes;
pub mod settings; // Provider catalog and per-request provider configuration
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
