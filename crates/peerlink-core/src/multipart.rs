//! multipart/form-data 单文件解析
//!
//! 只处理请求体中的第一个文件 part，其余 part 被忽略。
//! 这不是通用的 MIME 实现，只覆盖浏览器上传单个文件的场景。

use crate::error::DecodeError;

pub const DEFAULT_FILENAME: &str = "unnamed-file";
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const FILENAME_MARKER: &str = "filename=\"";
const CONTENT_TYPE_MARKER: &str = "content-type:";

/// 从请求体中解出的文件字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartField {
    pub filename: String,
    pub content_type: String,
    pub payload: Vec<u8>,
}

/// 从请求的 `Content-Type` 头中提取 boundary
///
/// 例如 `multipart/form-data; boundary="----abc"` -> `----abc`
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    let start = content_type.find("boundary=")? + "boundary=".len();
    let rest = &content_type[start..];
    let value = rest.split(';').next().unwrap_or(rest);
    let boundary = value.replace('"', "").trim().to_string();
    if boundary.is_empty() {
        None
    } else {
        Some(boundary)
    }
}

/// 解析 multipart 请求体，返回第一个文件 part
pub fn decode(body: &[u8], boundary: &str) -> Result<MultipartField, DecodeError> {
    let marker = format!("--{boundary}");
    let marker = marker.as_bytes();

    let opening = find(body, marker, 0).ok_or(DecodeError::MissingBoundary)?;
    // 跳过 boundary 行末的 CRLF
    let header_start = opening + marker.len() + 2;

    let header_end =
        find(body, b"\r\n\r\n", header_start).ok_or(DecodeError::MissingHeaderSeparator)?;
    let header = String::from_utf8_lossy(&body[header_start..header_end]);

    let payload_start = header_end + 4;
    // `--boundary--` 以 `--boundary` 开头，所以一次查找同时覆盖结束标记
    let mut payload_end =
        find(body, marker, payload_start).ok_or(DecodeError::MissingClosingBoundary)?;
    if payload_end >= payload_start + 2 && &body[payload_end - 2..payload_end] == b"\r\n" {
        payload_end -= 2;
    }

    Ok(MultipartField {
        filename: extract_filename(&header),
        content_type: extract_content_type(&header),
        payload: body[payload_start..payload_end].to_vec(),
    })
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}

/// 引号内的 `"` 不做转义处理，遇到的第一个 `"` 即结束
fn extract_filename(header: &str) -> String {
    let Some(start) = header.find(FILENAME_MARKER) else {
        return DEFAULT_FILENAME.to_string();
    };
    let rest = &header[start + FILENAME_MARKER.len()..];
    match rest.find('"') {
        Some(end) => rest[..end].to_string(),
        None => DEFAULT_FILENAME.to_string(),
    }
}

fn extract_content_type(header: &str) -> String {
    let lower = header.to_ascii_lowercase();
    let Some(start) = lower.find(CONTENT_TYPE_MARKER) else {
        return DEFAULT_CONTENT_TYPE.to_string();
    };
    let rest = &header[start + CONTENT_TYPE_MARKER.len()..];
    let line = rest.split("\r\n").next().unwrap_or(rest).trim();
    if line.is_empty() {
        DEFAULT_CONTENT_TYPE.to_string()
    } else {
        line.to_string()
    }
}
