//! 中继线协议
//!
//! 发送端写入一段文本头，随后紧跟文件原始字节：
//!
//! ```text
//! Filename: <name>\r\n
//! Content-Type: <type>\r\n
//! \r\n
//! <raw bytes ...>
//! ```
//!
//! 没有长度字段，发送端关闭连接即表示文件结束。因此接收端无法仅凭头部
//! 区分完整传输和被截断的传输。

use crate::multipart::DEFAULT_CONTENT_TYPE;

/// 头部结束标记
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// 网关读取头部时允许的最大字节数
pub const MAX_HEADER_LEN: usize = 8 * 1024;

const FILENAME_PREFIX: &str = "Filename:";
const CONTENT_TYPE_PREFIX: &str = "Content-Type:";

/// 中继连接上的文件元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayHeader {
    pub filename: String,
    pub content_type: String,
}

impl RelayHeader {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
        }
    }

    /// 编码为线上格式（包含结尾空行）
    pub fn encode(&self) -> String {
        format!(
            "{FILENAME_PREFIX} {}\r\n{CONTENT_TYPE_PREFIX} {}\r\n\r\n",
            self.filename, self.content_type
        )
    }

    /// 解析头部文本（不含结束标记）
    ///
    /// 每个字段取第一条匹配的行。没有 `Filename:` 行时返回 `None`。
    pub fn parse(text: &str) -> Option<Self> {
        let filename = first_value(text, FILENAME_PREFIX)?;
        let content_type = first_value(text, CONTENT_TYPE_PREFIX)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        Some(Self {
            filename,
            content_type,
        })
    }
}

fn first_value(text: &str, prefix: &str) -> Option<String> {
    text.lines()
        .find_map(|line| line.strip_prefix(prefix))
        .map(|v| v.trim().to_string())
}

/// 在缓冲区中查找头部结束标记，返回标记起始位置
pub fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_bit_exact() {
        let header = RelayHeader::new("hello.txt", "text/plain");
        assert_eq!(
            header.encode(),
            "Filename: hello.txt\r\nContent-Type: text/plain\r\n\r\n"
        );
    }

    #[test]
    fn test_parse_encoded_header() {
        let encoded = RelayHeader::new("report 2024.pdf", "application/pdf").encode();
        let end = find_terminator(encoded.as_bytes()).unwrap();
        let parsed = RelayHeader::parse(&encoded[..end]).unwrap();
        assert_eq!(parsed.filename, "report 2024.pdf");
        assert_eq!(parsed.content_type, "application/pdf");
    }

    #[test]
    fn test_parse_first_line_wins_and_defaults() {
        let parsed = RelayHeader::parse("Filename: a.txt\r\nFilename: b.txt").unwrap();
        assert_eq!(parsed.filename, "a.txt");
        assert_eq!(parsed.content_type, DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn test_parse_without_filename() {
        assert_eq!(RelayHeader::parse("Content-Type: text/plain"), None);
        assert_eq!(RelayHeader::parse(""), None);
    }

    #[test]
    fn test_find_terminator() {
        assert_eq!(find_terminator(b"abc\r\n\r\nrest"), Some(3));
        assert_eq!(find_terminator(b"abc\r\n\r"), None);
    }
}
