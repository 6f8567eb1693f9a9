mod config;
mod errors;
mod extraction;
mod llm_client;
mod models;
mod parsing;
mod routes;
mod state;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::parsing::{AiExtractor, HeuristicTables, ResumeParser};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resumatch API v{}", env!("CARGO_PKG_VERSION"));

    // Heuristic tables: built-in unless an override file is configured
    let tables = match &config.heuristics_path {
        Some(path) => {
            info!("Loading heuristic tables from {}", path.display());
            HeuristicTables::load(path)?
        }
        None => HeuristicTables::default(),
    };
    let tables = tables
        .compile()
        .context("Heuristic tables contain an invalid pattern")?;

    // AI extraction is optional; without a key every resume goes through the heuristic parser
    let ai = match &config.anthropic_api_key {
        Some(key) => {
            let llm = LlmClient::new(key.clone(), config.llm_max_retries)?;
            info!(
                "LLM client initialized (model: {}, timeout: {}s)",
                llm_client::MODEL,
                config.ai_timeout.as_secs()
            );
            Some(AiExtractor::new(Arc::new(llm)))
        }
        None => {
            warn!("ANTHROPIC_API_KEY not set, AI extraction disabled");
            None
        }
    };

    let state = AppState {
        config: config.clone(),
        parser: Arc::new(ResumeParser::new(ai, tables, config.ai_timeout)),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict allowed origins once the frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
