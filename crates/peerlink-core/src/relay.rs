//! 一次性中继监听端
//!
//! 每个 offer 对应一个独立任务：在 offer 的端口上监听，只接受一个连接，
//! 接受后立即关闭监听 socket，再由单独的发送任务写出头部和文件内容。
//! 无论发送成功与否，最后都会把 offer 从注册表中移除。

use log::{debug, error, info, warn};

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::config::GatewaySettings;
use crate::error::RelayError;
use crate::protocol::RelayHeader;
use crate::registry::{Offer, OfferRegistry};

/// 中继监听端的运行参数
#[derive(Debug, Clone)]
pub struct RelayOptions {
    pub bind_ip: IpAddr,
    pub chunk_size: usize,
    /// `None` 时 accept 无限期等待
    pub offer_ttl: Option<Duration>,
}

impl RelayOptions {
    pub fn from_settings(settings: &GatewaySettings) -> Self {
        Self {
            bind_ip: settings.relay_bind_ip,
            chunk_size: settings.chunk_size.max(1),
            offer_ttl: settings.offer_ttl(),
        }
    }
}

/// 已绑定端口、等待唯一一个下载方的监听端
pub struct RelayListener {
    registry: OfferRegistry,
    offer: Arc<Offer>,
    listener: TcpListener,
    options: RelayOptions,
}

impl RelayListener {
    /// 为注册表中的 offer 绑定监听端口
    ///
    /// 绑定失败时 offer 会被移除，对应的 code 从此失效。
    pub async fn bind(
        registry: &OfferRegistry,
        port: u16,
        options: RelayOptions,
    ) -> Result<Self, RelayError> {
        let offer = registry.lookup(port).ok_or(RelayError::RegistryMiss(port))?;

        let listener = match TcpListener::bind(SocketAddr::new(options.bind_ip, port)).await {
            Ok(listener) => listener,
            Err(source) => {
                registry.remove(port);
                return Err(RelayError::ListenerBind { port, source });
            }
        };

        info!("Serving {} on port {}", offer.filename, port);

        Ok(Self {
            registry: registry.clone(),
            offer,
            listener,
            options,
        })
    }

    pub fn port(&self) -> u16 {
        self.offer.port
    }

    /// 等待一个连接并把它交给发送任务
    ///
    /// 返回时监听 socket 已关闭，同一端口上的后续连接会被拒绝。
    pub async fn serve(self) -> Result<(), RelayError> {
        let Self {
            registry,
            offer,
            listener,
            options,
        } = self;
        let port = offer.port;

        let accepted = match options.offer_ttl {
            Some(ttl) => match tokio::time::timeout(ttl, listener.accept()).await {
                Ok(res) => res,
                Err(_) => {
                    drop(listener);
                    registry.remove(port);
                    warn!("Offer on port {} expired after {:?}", port, ttl);
                    return Err(RelayError::Expired(port));
                }
            },
            None => listener.accept().await,
        };
        drop(listener);

        let (stream, peer) = match accepted {
            Ok(conn) => conn,
            Err(e) => {
                registry.remove(port);
                return Err(RelayError::TransferIo(e));
            }
        };
        info!("Client connected on port {}: {}", port, peer);

        tokio::spawn(send_and_cleanup(
            registry,
            offer,
            stream,
            options.chunk_size,
        ));
        Ok(())
    }
}

/// 查找、绑定并服务一个 offer
///
/// offer 不存在或端口绑定失败时只记录日志，上传方早已拿到响应。
pub async fn serve(registry: OfferRegistry, port: u16, options: RelayOptions) {
    let listener = match RelayListener::bind(&registry, port, options).await {
        Ok(listener) => listener,
        Err(RelayError::RegistryMiss(port)) => {
            info!("No file is associated with port {}", port);
            return;
        }
        Err(e) => {
            error!("Failed to start relay: {}", e);
            return;
        }
    };
    if let Err(e) = listener.serve().await {
        warn!("Relay on port {} ended without a transfer: {}", port, e);
    }
}

async fn send_and_cleanup(
    registry: OfferRegistry,
    offer: Arc<Offer>,
    mut stream: TcpStream,
    chunk_size: usize,
) {
    match send_offer(&mut stream, &offer, chunk_size).await {
        Ok(sent) => info!("File {} sent ({} bytes)", offer.filename, sent),
        Err(e) => error!("Error sending file {}: {}", offer.filename, e),
    }

    // 先移除再关闭连接，下载方看到 EOF 时 code 已经失效
    registry.remove(offer.port);
    if let Err(e) = stream.shutdown().await {
        debug!("Relay socket shutdown on port {}: {}", offer.port, e);
    }
}

/// 写出头部，再按块写出文件内容，返回文件字节数
async fn send_offer(stream: &mut TcpStream, offer: &Offer, chunk_size: usize) -> std::io::Result<u64> {
    let mut file = File::open(&offer.file_path).await?;

    let header = RelayHeader::new(offer.filename.clone(), offer.content_type.clone());
    stream.write_all(header.encode().as_bytes()).await?;
    stream.flush().await?;

    let mut buf = vec![0u8; chunk_size];
    let mut sent = 0u64;
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        stream.write_all(&buf[..n]).await?;
        sent += n as u64;
    }
    stream.flush().await?;
    Ok(sent)
}
