use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dataset_chat::{
    config::Config,
    dataset::{configured_source, DefaultDataset},
    llm::HttpAdapterFactory,
    routes::create_router,
    AppState,
};

#[derive(Parser, Debug)]
#[command(name = "dataset-chat", version, about = "Chat with a CSV dataset through hosted LLMs")]
struct Cli {
    /// Port to listen on (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Address to bind (overrides HOST)
    #[arg(long)]
    host: Option<String>,

    /// CSV file served as the default dataset (overrides DEFAULT_DATASET_PATH)
    #[arg(long)]
    dataset: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dataset_chat=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(path) = cli.dataset {
        config.dataset.default_path = Some(path);
    }
    info!("Configuration loaded: {:?}", config.server);

    let default_dataset = DefaultDataset::new(configured_source(&config.dataset));
    let adapters = Arc::new(HttpAdapterFactory::new(config.llm.clone()));
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let state = AppState::new(config, default_dataset, adapters);
    let app = create_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
