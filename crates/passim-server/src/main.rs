#![allow(clippy::doc_markdown)]
//! `Passim` Server - REST API for passage search.

use anyhow::Context;
use clap::Parser;
use passim_core::{PassimConfig, SearchService, ServingIndex};
use passim_server::{router, AppState, HttpEncoder};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Passim Server - passage search over an HNSW index
#[derive(Parser, Debug)]
#[command(name = "passim-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "passim.toml", env = "PASSIM_CONFIG")]
    config: PathBuf,

    /// Host address to bind to (overrides server.host)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides server.port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Index file (overrides server.index_path)
    #[arg(long)]
    index: Option<String>,

    /// Passage table (overrides server.passages_path)
    #[arg(long)]
    passages: Option<String>,
}

fn init_tracing(config: &PassimConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=debug", config.logging.level)));
    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = PassimConfig::load_from_path(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(index) = args.index {
        config.server.index_path = index;
    }
    if let Some(passages) = args.passages {
        config.server.passages_path = passages;
    }
    config.validate()?;

    init_tracing(&config);
    tracing::info!("Starting Passim server...");

    // Loaded before the runtime starts: both are blocking
    let index = ServingIndex::load(&config.server.index_path, &config.server.passages_path)
        .with_context(|| format!("loading index {}", config.server.index_path))?;
    let encoder = HttpEncoder::new(
        config.server.encoder_url.clone(),
        Duration::from_millis(config.server.encoder_timeout_ms),
    )?;
    tracing::info!(
        nodes = index.graph().len(),
        dimension = index.graph().dimension(),
        encoder = encoder.url(),
        "Serving index ready"
    );

    let state = Arc::new(AppState::new(
        SearchService::new(index),
        Arc::new(encoder),
        config,
    ));

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(Arc::clone(&state)))?;

    // Last reference (and the blocking HTTP client) drops outside the runtime
    drop(runtime);
    drop(state);
    Ok(())
}

async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    tracing::info!("Passim server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;
    Ok(())
}
