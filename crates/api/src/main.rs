use anyhow::{Context, Result};
use travelguide_api::{build_app_with, ApiConfig};
use travelguide_observability::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("travelguide_api");

    let config = ApiConfig::from_env();
    let bind = config.bind.clone();
    let app = build_app_with(config)?;

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(bind = %bind, "travelguide api started");

    axum::serve(listener, app).await?;
    Ok(())
}
