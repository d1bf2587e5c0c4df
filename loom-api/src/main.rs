//! loom-api - Lucid Loom backend service
//!
//! HTTP + WebSocket API for the dream journal: auth, dream CRUD, the
//! asynchronous AI interpretation pipeline, analytics, and per-dream
//! status push.

use anyhow::Result;
use loom_api::{build_router, AppState};
use loom_common::config::AppConfig;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber before anything can fail
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting Lucid Loom API (loom-api) v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load()?;
    info!("Database path: {}", config.database_path.display());

    if config.groq_api_key.is_none() {
        info!("GROQ_API_KEY not configured - dream interpretation will report a configuration error");
    }
    if config.openai_api_key.is_none() {
        info!("OPENAI_API_KEY not configured - image generation disabled");
    }

    let pool = loom_common::db::init_database(&config.database_path).await?;
    info!("✓ Connected to database");

    let state = AppState::new(pool, &config);
    let app = build_router(state, &config.cors_origins);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("loom-api listening on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
