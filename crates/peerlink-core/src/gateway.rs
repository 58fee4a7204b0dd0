//! 下载网关
//!
//! 把 HTTP 下载请求桥接到中继的原始 socket 协议：按 code 连接本地中继端口，
//! 读出文本头，把剩余字节落到临时文件，再作为 HTTP 响应流式返回。

use log::{debug, info, warn};

use axum::body::Body;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::GatewaySettings;
use crate::error::DownloadError;
use crate::multipart::DEFAULT_CONTENT_TYPE;
use crate::protocol::{self, MAX_HEADER_LEN, RelayHeader};

/// 下载网关
#[derive(Debug, Clone)]
pub struct DownloadGateway {
    connect_ip: IpAddr,
    connect_timeout: Duration,
    read_timeout: Duration,
    chunk_size: usize,
}

/// 已从中继完整读出的文件
#[derive(Debug)]
pub struct RelayDownload {
    pub header: RelayHeader,
    pub len: u64,
    spool: NamedTempFile,
}

impl DownloadGateway {
    pub fn from_settings(settings: &GatewaySettings) -> Self {
        Self {
            connect_ip: settings.relay_connect_ip,
            connect_timeout: settings.connect_timeout(),
            read_timeout: settings.read_timeout(),
            chunk_size: settings.chunk_size.max(1),
        }
    }

    /// 把 code 解析为中继端口
    pub fn parse_code(code: &str) -> Result<u16, DownloadError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(DownloadError::MissingCode);
        }
        match code.parse::<u16>() {
            Ok(port) if port != 0 => Ok(port),
            _ => Err(DownloadError::InvalidCode(code.to_string())),
        }
    }

    /// 按 code 从中继取回文件
    pub async fn fetch(&self, code: &str) -> Result<RelayDownload, DownloadError> {
        let port = Self::parse_code(code)?;
        let addr = SocketAddr::new(self.connect_ip, port);

        let mut stream = match tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                warn!("Relay connect to {} failed: {}", addr, source);
                return Err(DownloadError::Connect { port, source });
            }
            Err(_) => return Err(DownloadError::Timeout(port)),
        };
        debug!("Connected to relay {}", addr);

        let (header, leftover) = self.read_header(&mut stream, port).await?;
        info!(
            "Receiving {} ({}) from port {}",
            header.filename, header.content_type, port
        );

        let spool = tempfile::Builder::new()
            .prefix("peerlink-")
            .suffix(".tmp")
            .tempfile()?;
        let mut out = tokio::fs::File::from_std(spool.reopen()?);
        out.write_all(&leftover).await?;
        let mut len = leftover.len() as u64;

        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let n = self.timed(port, stream.read(&mut buf)).await?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n]).await?;
            len += n as u64;
        }
        out.flush().await?;

        debug!("Relay on port {} closed after {} bytes", port, len);
        Ok(RelayDownload { header, len, spool })
    }

    /// 读到 `\r\n\r\n` 为止，返回解析出的头部和已多读的载荷字节
    async fn read_header(
        &self,
        stream: &mut TcpStream,
        port: u16,
    ) -> Result<(RelayHeader, Vec<u8>), DownloadError> {
        let mut buf = Vec::with_capacity(256);
        let mut chunk = [0u8; 512];

        let end = loop {
            if let Some(end) = protocol::find_terminator(&buf) {
                break end;
            }
            if buf.len() > MAX_HEADER_LEN {
                warn!("Relay header on port {} exceeds {} bytes", port, MAX_HEADER_LEN);
                return Err(DownloadError::ProtocolViolation(
                    "header too large".to_string(),
                ));
            }
            let n = self.timed(port, stream.read(&mut chunk)).await?;
            if n == 0 {
                warn!("Relay on port {} closed before header end", port);
                return Err(DownloadError::ProtocolViolation(
                    "no header received".to_string(),
                ));
            }
            buf.extend_from_slice(&chunk[..n]);
        };

        let header = RelayHeader::parse(&String::from_utf8_lossy(&buf[..end])).ok_or_else(|| {
            warn!("Relay header on port {} has no Filename line", port);
            DownloadError::ProtocolViolation("missing Filename header".to_string())
        })?;

        Ok((header, buf.split_off(end + protocol::HEADER_TERMINATOR.len())))
    }

    async fn timed<T>(
        &self,
        port: u16,
        fut: impl Future<Output = std::io::Result<T>>,
    ) -> Result<T, DownloadError> {
        match tokio::time::timeout(self.read_timeout, fut).await {
            Ok(res) => Ok(res?),
            Err(_) => Err(DownloadError::Timeout(port)),
        }
    }
}

impl RelayDownload {
    pub fn path(&self) -> &std::path::Path {
        self.spool.path()
    }

    /// `Content-Disposition` 头的值
    pub fn content_disposition(&self) -> String {
        format!(
            "attachment; filename=\"{}\"",
            sanitize_filename(&self.header.filename)
        )
    }
}

impl IntoResponse for RelayDownload {
    fn into_response(self) -> Response {
        let file = match self.spool.reopen() {
            Ok(file) => tokio::fs::File::from_std(file),
            Err(e) => return DownloadError::Io(e).into_response(),
        };

        let content_type = HeaderValue::from_str(&self.header.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
        let disposition = HeaderValue::from_str(&self.content_disposition())
            .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
        let len = self.len;

        // 临时文件随响应体一起释放，无论响应是否发送完整
        let spool = self.spool;
        let stream = tokio_util::io::ReaderStream::new(file).map(move |chunk| {
            let _spool = &spool;
            chunk
        });

        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, content_type),
                (header::CONTENT_DISPOSITION, disposition),
                (header::CONTENT_LENGTH, HeaderValue::from(len)),
            ],
            Body::from_stream(stream),
        )
            .into_response()
    }
}

/// 替换会破坏带引号头部值的字符
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
