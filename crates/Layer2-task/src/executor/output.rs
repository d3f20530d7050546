//! 출력 캡처 - 상한을 넘으면 버리고 표식을 남긴다

use tokio::io::{AsyncRead, AsyncReadExt};

/// 잘린 출력 끝에 붙는 표식 (`{}`는 버린 바이트 수)
pub const TRUNCATION_MARKER: &str = "\n...[output truncated: {} bytes omitted]";

/// 크기 상한이 있는 출력 버퍼
///
/// 상한 이후에도 파이프는 끝까지 읽어서 자식 프로세스가 막히지 않게 한다.
#[derive(Debug)]
pub struct CappedBuffer {
    data: Vec<u8>,
    cap: usize,
    omitted: usize,
}

impl CappedBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            data: Vec::with_capacity(cap.min(8 * 1024)),
            cap,
            omitted: 0,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        let room = self.cap.saturating_sub(self.data.len());
        let take = room.min(chunk.len());
        self.data.extend_from_slice(&chunk[..take]);
        self.omitted += chunk.len() - take;
    }

    pub fn is_truncated(&self) -> bool {
        self.omitted > 0
    }

    /// 스트림을 EOF까지 읽기
    pub async fn drain<R>(mut self, mut reader: R) -> Self
    where
        R: AsyncRead + Unpin,
    {
        let mut chunk = [0u8; 8192];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => self.push(&chunk[..n]),
            }
        }
        self
    }

    /// ANSI 이스케이프를 제거한 텍스트 (+ 잘렸으면 표식)
    pub fn into_text(self) -> (String, bool) {
        let cleaned = strip_ansi_escapes::strip(&self.data);
        let mut text = String::from_utf8_lossy(&cleaned).into_owned();
        let truncated = self.is_truncated();
        if truncated {
            text.push_str(&TRUNCATION_MARKER.replace("{}", &self.omitted.to_string()));
        }
        (text, truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_under_cap() {
        let mut buf = CappedBuffer::new(16);
        buf.push(b"hello");
        let (text, truncated) = buf.into_text();
        assert_eq!(text, "hello");
        assert!(!truncated);
    }

    #[test]
    fn test_over_cap_adds_marker() {
        let mut buf = CappedBuffer::new(4);
        buf.push(b"abcdef");
        buf.push(b"gh");
        let (text, truncated) = buf.into_text();
        assert!(truncated);
        assert_eq!(text, "abcd\n...[output truncated: 4 bytes omitted]");
    }

    #[test]
    fn test_strips_ansi() {
        let mut buf = CappedBuffer::new(64);
        buf.push(b"\x1b[31mred\x1b[0m");
        assert_eq!(buf.into_text().0, "red");
    }

    #[tokio::test]
    async fn test_drain_reader() {
        let data: &[u8] = b"0123456789";
        let buf = CappedBuffer::new(3).drain(data).await;
        let (text, truncated) = buf.into_text();
        assert!(truncated);
        assert!(text.starts_with("012\n"));
    }
}
