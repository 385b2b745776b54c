//! `quill-blog` server binary.
//!
//! Usage: `quill-blog [config.json]`

use anyhow::Context;
use quill_blog::models::create_tables;
use quill_blog::{build_server, AppState, Config};
use quill_core::DatabasePool;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("quill_blog=info,quill_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let override_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(override_path.as_deref()).context("loading configuration")?;
    init_tracing()?;

    let pool = DatabasePool::connect(&config.db.url, &config.pool_config())
        .await
        .with_context(|| format!("connecting to {}", config.db.url))?;
    if config.db.init_schema {
        create_tables(&pool).await.context("creating tables")?;
    }

    let server_config = config.server_config()?;
    info!(debug = config.debug, address = %server_config.address, "starting quill-blog");
    let state = Arc::new(AppState {
        pool: pool.clone(),
        config,
    });
    let server = build_server(state, server_config)?;

    let served = server.serve().await;
    pool.close().await;
    served?;
    Ok(())
}
