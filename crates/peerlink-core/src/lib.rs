//! PeerLink Core Library
//!
//! 局域网文件中转：上传文件换取一个数字 code，其他设备凭 code 经同一网关下载。
//!
//! # 模块
//!
//! - **multipart**: 单文件 multipart/form-data 请求体解析
//! - **registry**: 端口 -> 文件 的 offer 注册表
//! - **protocol**: 中继线协议 (文本头 + 原始字节，关闭即结束)
//! - **relay**: 每个 offer 一个的一次性 TCP 监听端
//! - **gateway**: 把 HTTP 下载桥接到中继 socket
//! - **server**: axum 路由
//! - **config**: 网关设置
//!
//! # 使用示例
//!
//! ```ignore
//! use peerlink_core::{AppState, GatewaySettings, router};
//!
//! let settings = GatewaySettings::load();
//! let listener = tokio::net::TcpListener::bind(settings.bind_addr).await?;
//! axum::serve(listener, router(AppState::new(settings))).await?;
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod multipart;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod server;

pub use config::GatewaySettings;
pub use error::{DecodeError, DownloadError, RelayError, UploadError};
pub use gateway::{DownloadGateway, RelayDownload};
pub use multipart::{MultipartField, decode};
pub use protocol::RelayHeader;
pub use registry::{Offer, OfferRegistry, PORT_RANGE};
pub use relay::{RelayListener, RelayOptions};
pub use server::{AppState, UploadResponse, router};
