//! 网关服务 - 上传目录准备与 HTTP 监听

use anyhow::{Context, Result};
use peerlink_core::{AppState, GatewaySettings, router};
use tokio::net::TcpListener;

pub async fn run(settings: GatewaySettings) -> Result<()> {
    tokio::fs::create_dir_all(&settings.upload_dir)
        .await
        .with_context(|| format!("creating upload dir {:?}", settings.upload_dir))?;

    let listener = TcpListener::bind(settings.bind_addr)
        .await
        .with_context(|| format!("binding {}", settings.bind_addr))?;

    tracing::info!("Upload dir: {:?}", settings.upload_dir);
    tracing::info!("Gateway listening on http://{}", listener.local_addr()?);
    if settings.offer_ttl_secs.is_none() {
        tracing::debug!("Offers never expire; unclaimed relays stay open until shutdown");
    }

    let app = router(AppState::new(settings));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down...");
}
