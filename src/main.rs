mod config;
mod engines;
mod error;
mod files;
mod handlers;
mod router;


use anyhow::Context;
use clap::Parser;
use config::Config;
use handlers::AppState;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pagecast=info,tower_http=info".into()),
        )
        .init();

    let config = Config::parse();
    config.prepare_output_dir().with_context(|| {
        format!(
            "failed to create output directory {}",
            config.output_dir.display()
        )
    })?;
    info!("Working files go to {}", config.output_dir.display());

    let addr = config.addr.clone();
    let state = Arc::new(AppState::new(config).await);
    if !state.rasterizer_available {
        warn!("PDF conversion will fail until pdftoppm is installed or --rasterizer-path is set");
    }

    let app = router::build(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("🚀 pagecast running on http://{}", addr);
    info!("🖼  Editor: http://{}/editor", addr);
    info!("🔄 Convert PDFs: POST http://{}/convert-pdf/", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
