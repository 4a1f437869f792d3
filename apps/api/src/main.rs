use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tailor::config::Config;
use tailor::generation::{Generator, Pipeline, StructuralValidator};
use tailor::llm_client::{GenerationProvider, LlmClient};
use tailor::retrieval::{Embedder, OpenAiEmbedder};
use tailor::routes::build_router;
use tailor::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tailor API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize embedding provider
    let embedding_client = OpenAiEmbedder::new(
        config.openai_api_key.clone(),
        &config.openai_base_url,
        config.embedding_model.clone(),
        config.provider_timeout,
    )?;
    let embedder = Embedder::new(
        Arc::new(embedding_client),
        config.provider_timeout,
        config.embed_batch_size,
    );
    info!("Embedder initialized (model: {})", embedder.provider_name());

    // Initialize generation provider
    let llm = LlmClient::new(
        config.openai_api_key.clone(),
        &config.openai_base_url,
        config.generation_model.clone(),
        config.provider_timeout,
    )?;
    info!(
        "LLM client initialized (model: {}, temperature: {})",
        llm.model(),
        config.settings.generation.temperature
    );
    let generator = Generator::new(
        Arc::new(llm),
        &config.settings.generation,
        config.provider_timeout,
    );

    let pipeline = Pipeline::new(
        embedder,
        Arc::new(generator),
        Arc::new(StructuralValidator),
        config.settings,
    )
    .context("invalid pipeline settings")?;

    // Build router
    let app = build_router(AppState::new(pipeline))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
