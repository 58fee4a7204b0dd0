//! HTTP 网关路由
//!
//! - `POST /api/upload`: 上传单个文件，返回下载 code
//! - `GET /api/download?code=`: 按 code 经中继取回文件
//! - `GET /api/health`: 健康检查
//!
//! 所有响应都附带宽松的 CORS 头。

use log::{debug, error, info};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::GatewaySettings;
use crate::error::{DownloadError, UploadError};
use crate::gateway::{DownloadGateway, RelayDownload};
use crate::multipart::{self, DEFAULT_FILENAME};
use crate::registry::OfferRegistry;
use crate::relay::{RelayListener, RelayOptions};

/// 路由共享状态
#[derive(Clone)]
pub struct AppState {
    pub registry: OfferRegistry,
    pub settings: Arc<GatewaySettings>,
    pub gateway: DownloadGateway,
}

impl AppState {
    pub fn new(settings: GatewaySettings) -> Self {
        Self::with_registry(settings, OfferRegistry::new())
    }

    pub fn with_registry(settings: GatewaySettings, registry: OfferRegistry) -> Self {
        Self {
            gateway: DownloadGateway::from_settings(&settings),
            registry,
            settings: Arc::new(settings),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub code: String,
    pub filename: String,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub code: Option<String>,
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.settings.max_upload_bytes;

    Router::new()
        .route("/api/upload", post(upload_handler).options(preflight))
        .route("/api/download", get(download_handler).options(preflight))
        .route("/api/health", get(health_handler).options(preflight))
        .fallback(fallback_handler)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::map_response(add_cors_headers))
        .with_state(state)
}

async fn upload_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UploadResponse>, UploadError> {
    let boundary = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(multipart::boundary_from_content_type)
        .ok_or(UploadError::MissingBoundary)?;

    let field = multipart::decode(&body, &boundary)?;
    let filename = safe_filename(&field.filename);

    let dir = state
        .settings
        .upload_dir
        .join(uuid::Uuid::new_v4().to_string());
    let path = persist(&dir, &filename, &field.payload)
        .await
        .map_err(UploadError::Persist)?;
    debug!("Stored upload at {:?} ({} bytes)", path, field.payload.len());

    let port = state.registry.offer(&path);
    if let Some(offer) = state.registry.lookup(port) {
        info!(
            "Offered {} ({}) on port {}",
            offer.filename, offer.content_type, port
        );
    }

    // 先绑定端口再返回 code，之后的下载不会和绑定竞争
    let options = RelayOptions::from_settings(&state.settings);
    let listener = RelayListener::bind(&state.registry, port, options).await?;
    tokio::spawn(async move {
        if let Err(e) = listener.serve().await {
            error!("Relay on port {} failed: {}", port, e);
        }
    });

    Ok(Json(UploadResponse {
        code: port.to_string(),
        filename,
    }))
}

async fn persist(dir: &Path, filename: &str, payload: &[u8]) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(filename);
    tokio::fs::write(&path, payload).await?;
    Ok(path)
}

/// 只保留最后一段路径，避免写到上传目录之外
fn safe_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if base.is_empty() || base == "." || base == ".." {
        DEFAULT_FILENAME.to_string()
    } else {
        base.to_string()
    }
}

async fn download_handler(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<RelayDownload, DownloadError> {
    let code = query.code.ok_or(DownloadError::MissingCode)?;
    state.gateway.fetch(&code).await
}

async fn health_handler() -> &'static str {
    "Backend OK"
}

async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn fallback_handler(method: Method) -> Response {
    if method == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        (StatusCode::NOT_FOUND, "Not Found").into_response()
    }
}

async fn add_cors_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}
