use context_cache::observability::init_tracing;
use context_cache::{CacheLayer, Config, StoreResult};

#[tokio::main]
async fn main() -> StoreResult<()> {
    init_tracing()?;

    let config = Config::from_env()?;
    tracing::info!("Starting context cache against {}", config.redis.redacted_url());

    let layer = CacheLayer::connect(&config).await?;

    let health = layer.health().check().await;
    tracing::info!(
        status = ?health.status,
        response_time_ms = ?health.response_time_ms,
        "Store health: {}",
        health.message.as_deref().unwrap_or("ok")
    );

    tracing::info!("Metrics:\n{}", layer.metrics_text()?);

    layer.shutdown().await?;
    Ok(())
}
