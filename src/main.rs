//! Service entrypoint

use anyhow::Context;
use std::sync::Arc;
use summary_engine::api::{self, AppState};
use summary_engine::llm::HttpCompletionBackend;
use summary_engine::{Config, SummarizeEngine};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("summary_engine=info,tower_http=info")),
        )
        .init();

    let config = Config::load().context("failed to load configuration")?;

    let backend = Arc::new(
        HttpCompletionBackend::new(config.llm.clone())
            .context("failed to build completion backend")?,
    );
    let engine = Arc::new(SummarizeEngine::new(config.clone(), backend));
    engine.start();

    let router = api::build_router(AppState { engine }, &config.server);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("listening on {addr}");
    axum::serve(listener, router).await?;

    Ok(())
}
