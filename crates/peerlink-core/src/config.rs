//! 网关配置和持久化
//!
//! 提供监听地址、上传目录、超时等设置的存储和读取。

use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 网关设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// HTTP 网关监听地址
    pub bind_addr: SocketAddr,
    /// 中继监听端绑定的地址
    pub relay_bind_ip: IpAddr,
    /// 网关连接中继时使用的地址
    pub relay_connect_ip: IpAddr,
    /// 上传文件保存目录
    pub upload_dir: PathBuf,
    /// 连接中继的超时 (毫秒)
    pub connect_timeout_ms: u64,
    /// 从中继读取的单次超时 (毫秒)
    pub read_timeout_ms: u64,
    /// 发送/接收分块大小
    pub chunk_size: usize,
    /// 上传请求体上限
    pub max_upload_bytes: usize,
    /// offer 无人领取时的过期时间，`None` 表示永不过期
    pub offer_ttl_secs: Option<u64>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080),
            relay_bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            relay_connect_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            upload_dir: std::env::temp_dir().join("peerlink-uploads"),
            connect_timeout_ms: 5000,
            read_timeout_ms: 5000,
            chunk_size: 4096,
            max_upload_bytes: 512 * 1024 * 1024,
            offer_ttl_secs: None,
        }
    }
}

impl GatewaySettings {
    /// 获取默认配置文件路径
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("peerlink");
        config_dir.join("settings.toml")
    }

    /// 加载设置（如果文件不存在则使用默认值）
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(settings) => {
                        debug!("Loaded settings from {:?}", path);
                        return settings;
                    }
                    Err(e) => {
                        log::warn!("Failed to parse settings: {}, using defaults", e);
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read settings file: {}, using defaults", e);
                }
            }
        }
        Self::default()
    }

    /// 保存设置
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        debug!("Saved settings to {:?}", path);
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn offer_ttl(&self) -> Option<Duration> {
        self.offer_ttl_secs.map(Duration::from_secs)
    }
}
