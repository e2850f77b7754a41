//! API Routes
//!
//! - `/api/chat` - Streamed chat about the active dataset
//! - `/api/health` - Health check
//! - `/api/providers` - Provider and model catalog
//! - `/api/dataset/*` - Default dataset summary and upload validation

pub mod chat;
pub mod health;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::dataset;
use crate::middleware::cors_layer;
use crate::models::AppState;
use crate::settings;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let cors = cors_layer(&state.config.server.cors_allowed_origins);

    Router::new()
        .merge(chat::router())
        .merge(health::router())
        .merge(settings::router())
        .merge(dataset::router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
