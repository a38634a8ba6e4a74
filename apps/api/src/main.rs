mod auth;
mod chat;
mod config;
mod db;
mod errors;
mod interviews;
mod llm_client;
mod models;
mod resumes;
mod routes;
mod state;
mod storage;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::resumes::ResumeArchive;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::PgStorage;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},tower_http=info",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting interview API v{}", env!("CARGO_PKG_VERSION"));

    // PostgreSQL (migrations run on connect)
    let pool = create_pool(&config.database_url).await?;
    let storage = Arc::new(PgStorage::new(pool));

    // Resume archive is optional
    let archive = match &config.s3 {
        Some(s3) => {
            let archive = ResumeArchive::connect(s3).await;
            info!("Resume archiving enabled (bucket: {})", s3.bucket);
            Some(archive)
        }
        None => {
            info!("S3 not configured; resume uploads will not be archived");
            None
        }
    };

    let llm = LlmClient::new(config.anthropic_api_key.clone(), config.upstream_timeout)?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let state = AppState::new(storage, Arc::new(llm), archive, config.clone());

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
