//! Gateway Client - 与网关 HTTP 接口通信

use anyhow::{Context, Result, bail};
use futures_util::StreamExt;
use peerlink_core::UploadResponse;
use reqwest::multipart::{Form, Part};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:8080";

const FALLBACK_FILENAME: &str = "downloaded-file";

pub struct GatewayClient {
    base: String,
    http: reqwest::Client,
}

impl GatewayClient {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub async fn upload(&self, file: &Path) -> Result<UploadResponse> {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .context("path has no file name")?;
        let data = tokio::fs::read(file)
            .await
            .with_context(|| format!("reading {}", file.display()))?;

        let form = Form::new().part("file", Part::bytes(data).file_name(name));
        let resp = self
            .http
            .post(format!("{}/api/upload", self.base))
            .multipart(form)
            .send()
            .await
            .map_err(connect_hint)?;

        if !resp.status().is_success() {
            let status = resp.status();
            bail!("upload failed ({}): {}", status, resp.text().await?);
        }
        Ok(resp.json().await?)
    }

    pub async fn download(&self, code: &str, dir: &Path) -> Result<PathBuf> {
        let resp = self
            .http
            .get(format!("{}/api/download", self.base))
            .query(&[("code", code)])
            .send()
            .await
            .map_err(connect_hint)?;

        if !resp.status().is_success() {
            let status = resp.status();
            bail!("download failed ({}): {}", status, resp.text().await?);
        }

        let filename = resp
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| FALLBACK_FILENAME.to_string());

        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(filename);
        let mut file = tokio::fs::File::create(&path)
            .await
            .with_context(|| format!("creating {}", path.display()))?;

        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(path)
    }

    pub async fn health(&self) -> Result<String> {
        let resp = self
            .http
            .get(format!("{}/api/health", self.base))
            .send()
            .await
            .map_err(connect_hint)?;
        Ok(resp.text().await?)
    }
}

fn connect_hint(e: reqwest::Error) -> anyhow::Error {
    if e.is_connect() {
        eprintln!("❌ 无法连接到网关: {}", e);
        eprintln!("   请确保 peerlink-daemon 正在运行");
        eprintln!("   运行: cargo xtask dev");
    }
    e.into()
}

/// 从 `attachment; filename="..."` 中取出文件名，只保留最后一段路径
fn filename_from_disposition(value: &str) -> Option<String> {
    let start = value.find("filename=")? + "filename=".len();
    let raw = value[start..].split(';').next()?.trim().trim_matches('"');
    let name = raw.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}
