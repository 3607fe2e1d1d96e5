use anyhow::Context;

use rigstock_api::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rigstock_observability::init();

    let config = AppConfig::from_env();
    let bind_addr = config.bind_addr.clone();

    let app = rigstock_api::app::build_app(config).await?;

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
