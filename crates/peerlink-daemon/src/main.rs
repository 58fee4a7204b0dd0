//! PeerLink Daemon
//!
//! 局域网文件中转网关：
//! - 接收上传并为每个文件分配一次性中继端口
//! - 按 code 经中继转发下载

mod service;

use anyhow::Result;
use clap::Parser;
use peerlink_core::GatewaySettings;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "peerlink-daemon", version, about = "PeerLink 文件中转网关")]
struct Args {
    /// HTTP 监听地址 (覆盖配置文件)
    #[arg(short, long)]
    bind: Option<SocketAddr>,
    /// 配置文件路径 (默认: <config_dir>/peerlink/settings.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 桥接 log crate（peerlink-core 使用）到 tracing
    let _ = tracing_log::LogTracer::init();

    // 初始化日志
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,peerlink_core=debug")),
        )
        .try_init();

    tracing::info!("PeerLink Daemon starting...");

    let mut settings = match &args.config {
        Some(path) => GatewaySettings::load_from(path),
        None => GatewaySettings::load(),
    };
    if let Some(bind) = args.bind {
        settings.bind_addr = bind;
    }

    if let Err(e) = service::run(settings).await {
        tracing::error!("Gateway exited: {:#}", e);
        return Err(e);
    }

    tracing::info!("PeerLink Daemon stopped");
    Ok(())
}
