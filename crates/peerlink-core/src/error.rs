//! 错误类型
//!
//! 每一类错误都限定在单个请求或单个 offer 内，不会导致进程退出。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::io;
use thiserror::Error;

/// multipart 请求体解析失败
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("opening boundary not found")]
    MissingBoundary,
    #[error("part header separator not found")]
    MissingHeaderSeparator,
    #[error("closing boundary not found")]
    MissingClosingBoundary,
}

/// 中继监听端 (发送侧) 错误
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("no offer registered on port {0}")]
    RegistryMiss(u16),
    #[error("failed to bind relay listener on port {port}: {source}")]
    ListenerBind {
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("transfer aborted: {0}")]
    TransferIo(#[from] io::Error),
    #[error("offer on port {0} expired before anyone connected")]
    Expired(u16),
}

/// 上传处理错误
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Invalid multipart Content-Type")]
    MissingBoundary,
    #[error("Multipart parsing failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("Failed to store upload: {0}")]
    Persist(#[source] io::Error),
    #[error("Failed to start relay: {0}")]
    RelayStart(#[from] RelayError),
}

impl UploadError {
    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::MissingBoundary | UploadError::Decode(_) => StatusCode::BAD_REQUEST,
            UploadError::Persist(_) | UploadError::RelayStart(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// 下载 (网关侧) 错误
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Missing ?code=")]
    MissingCode,
    #[error("Invalid code: {0}")]
    InvalidCode(String),
    #[error("stale or unknown code {port}: {source}")]
    Connect {
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("relay on port {0} timed out")]
    Timeout(u16),
    #[error("Sender closed or invalid stream: {0}")]
    ProtocolViolation(String),
    #[error("relay stream failed: {0}")]
    Io(#[from] io::Error),
}

impl DownloadError {
    pub fn status(&self) -> StatusCode {
        match self {
            DownloadError::MissingCode
            | DownloadError::InvalidCode(_)
            | DownloadError::ProtocolViolation(_) => StatusCode::BAD_REQUEST,
            DownloadError::Connect { .. } | DownloadError::Timeout(_) | DownloadError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for DownloadError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = if status == StatusCode::INTERNAL_SERVER_ERROR {
            format!("Download error: {self}")
        } else {
            self.to_string()
        };
        (status, body).into_response()
    }
}
