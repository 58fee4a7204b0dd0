//! Offer 注册表
//!
//! 端口 -> 待领取文件 的映射，在上传和下载请求之间共享。
//! 所有增删查都经过同一把锁；插入很少且很快，不需要按条目加锁。

use log::debug;
use rand::Rng;
use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use crate::multipart::{DEFAULT_CONTENT_TYPE, DEFAULT_FILENAME};

/// 分配 code 使用的动态端口范围
pub const PORT_RANGE: Range<u16> = 49152..65000;

/// 一个待领取的文件，创建后不再修改
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offer {
    pub port: u16,
    pub file_path: PathBuf,
    pub filename: String,
    pub content_type: String,
}

/// 线程安全的 offer 注册表
///
/// `Clone` 只复制句柄，所有副本共享同一份映射。
#[derive(Debug, Clone, Default)]
pub struct OfferRegistry {
    offers: Arc<RwLock<HashMap<u16, Arc<Offer>>>>,
}

impl OfferRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一个文件，返回分配到的端口
    ///
    /// 文件名取路径的最后一段，内容类型按扩展名猜测。
    /// 调用时文件必须存在，之后不再检查。
    pub fn offer(&self, file_path: impl Into<PathBuf>) -> u16 {
        let mut rng = rand::thread_rng();
        self.offer_with(file_path.into(), || rng.gen_range(PORT_RANGE))
    }

    /// 用给定的端口生成器登记文件
    ///
    /// 生成器会被反复调用，直到给出一个未被占用的端口。
    pub(crate) fn offer_with(&self, file_path: PathBuf, mut next_port: impl FnMut() -> u16) -> u16 {
        let filename = file_name_of(&file_path);
        let content_type = probe_content_type(&file_path);

        let mut offers = self.offers.write().unwrap_or_else(PoisonError::into_inner);
        let port = loop {
            let candidate = next_port();
            if !offers.contains_key(&candidate) {
                break candidate;
            }
            debug!("Port {} already offered, drawing again", candidate);
        };

        offers.insert(
            port,
            Arc::new(Offer {
                port,
                file_path,
                filename,
                content_type,
            }),
        );
        port
    }

    pub fn lookup(&self, port: u16) -> Option<Arc<Offer>> {
        self.offers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&port)
            .cloned()
    }

    pub fn remove(&self, port: u16) -> Option<Arc<Offer>> {
        self.offers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&port)
    }

    pub fn contains(&self, port: u16) -> bool {
        self.offers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&port)
    }

    pub fn len(&self) -> usize {
        self.offers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string())
}

fn probe_content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first()
        .map(|m| m.to_string())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
}
