//! PeerLink CLI
//!
//! 命令行客户端，通过 HTTP 与网关通信

mod client;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "peerlink", version, about = "PeerLink - 局域网文件中转")]
struct Cli {
    /// 网关地址
    #[arg(short, long, global = true, default_value = client::DEFAULT_SERVER)]
    server: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 上传文件并获取下载 code
    Upload {
        /// 要上传的文件路径
        file: PathBuf,
    },
    /// 凭 code 下载文件
    Download {
        /// 上传时得到的 code
        code: String,
        /// 保存目录 (默认: ~/Downloads)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// 检查网关是否在线
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = client::GatewayClient::new(&cli.server);

    match cli.command {
        Commands::Upload { file } => {
            println!("📤 上传文件: {}", file.display());
            let resp = client.upload(&file).await?;
            println!("   文件名: {}", resp.filename);
            println!("   下载 code: {}", resp.code);
        }
        Commands::Download { code, output } => {
            let dir = output.unwrap_or_else(|| {
                dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
            });
            println!("📥 下载 code {} (保存到: {})", code, dir.display());
            let saved = client.download(&code, &dir).await?;
            println!("✅ 已保存: {}", saved.display());
        }
        Commands::Health => {
            let status = client.health().await?;
            println!("网关状态: {}", status);
        }
    }

    Ok(())
}
