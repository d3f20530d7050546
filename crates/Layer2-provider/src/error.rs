//! LLM 호출 에러
//!
//! 세부 원인은 로그와 재시도 판단에만 쓰인다.
//! 파이프라인으로 올라가면 취소를 제외하고 모두 `Error::LlmUnavailable`이다.

use crate::retry::RetryHint;
use anvil_foundation::Error as FoundationError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// 401/403, 잘못된 키
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// 429
    #[error("Rate limit exceeded{}", .retry_after_ms.map(|ms| format!(", retry after {}ms", ms)).unwrap_or_default())]
    RateLimited { retry_after_ms: Option<u64> },

    /// 5xx
    #[error("Server error: {0}")]
    ServerError(String),

    /// HTTP 클라이언트 타임아웃 (초)
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    /// 연결 실패, DNS, reset
    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// 파싱할 수 없거나 비어 있는 응답
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// API 키 없음 등 설정 문제
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl ProviderError {
    /// HTTP 상태 코드 → 에러
    pub fn from_http_status(status: u16, body: &str) -> Self {
        let body = body.to_string();
        match status {
            401 | 403 => Self::Authentication(body),
            404 => Self::ModelNotFound(body),
            400 | 422 => Self::InvalidRequest(body),
            429 => Self::RateLimited {
                retry_after_ms: retry_after_ms(&body),
            },
            500..=599 => Self::ServerError(body),
            _ => Self::Unknown(format!("HTTP {}: {}", status, body)),
        }
    }

    /// reqwest 전송 에러 → 에러
    pub fn from_reqwest(err: &reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout_secs)
        } else if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }

    /// 다시 호출할 가치가 있는지
    pub fn retry_hint(&self) -> RetryHint {
        match self {
            Self::RateLimited { retry_after_ms } => {
                RetryHint::After(retry_after_ms.map(Duration::from_millis))
            }
            Self::ServerError(_) | Self::Network(_) | Self::Timeout(_) => RetryHint::Backoff,
            _ => RetryHint::GiveUp,
        }
    }
}

/// 429 본문의 대기 시간 (JSON `error.retry_after` 초, 또는 "retry ... N" 텍스트)
fn retry_after_ms(body: &str) -> Option<u64> {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/retry_after").and_then(|s| s.as_f64()));

    let secs = match from_json {
        Some(secs) => secs,
        None => {
            let tail = &body[body.find("retry")?..];
            let digits: String = tail
                .chars()
                .skip_while(|c| !c.is_ascii_digit())
                .take_while(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            digits.parse::<f64>().ok()?
        }
    };
    Some((secs * 1000.0) as u64)
}

impl From<ProviderError> for FoundationError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Cancelled => FoundationError::Cancelled("LLM request".to_string()),
            other => FoundationError::LlmUnavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_foundation::ErrorKind;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            ProviderError::from_http_status(401, "bad key"),
            ProviderError::Authentication(_)
        ));
        assert!(matches!(
            ProviderError::from_http_status(503, "overloaded"),
            ProviderError::ServerError(_)
        ));
        assert_eq!(
            ProviderError::from_http_status(429, r#"{"error":{"retry_after":1.5}}"#),
            ProviderError::RateLimited {
                retry_after_ms: Some(1500)
            }
        );
        assert_eq!(
            ProviderError::from_http_status(429, "slow down, retry in 2 seconds"),
            ProviderError::RateLimited {
                retry_after_ms: Some(2000)
            }
        );
    }

    #[test]
    fn test_retry_hints() {
        assert_eq!(
            ProviderError::Network("reset".into()).retry_hint(),
            RetryHint::Backoff
        );
        assert_eq!(
            ProviderError::RateLimited {
                retry_after_ms: Some(300)
            }
            .retry_hint(),
            RetryHint::After(Some(Duration::from_millis(300)))
        );
        assert_eq!(
            ProviderError::Authentication("x".into()).retry_hint(),
            RetryHint::GiveUp
        );
        assert_eq!(ProviderError::Cancelled.retry_hint(), RetryHint::GiveUp);
    }

    #[test]
    fn test_pipeline_sees_llm_unavailable() {
        for err in [
            ProviderError::Network("dns".into()),
            ProviderError::RateLimited {
                retry_after_ms: None,
            },
            ProviderError::InvalidResponse("no choices".into()),
        ] {
            let converted: FoundationError = err.into();
            assert_eq!(converted.kind(), ErrorKind::LlmUnavailable);
        }
        let cancelled: FoundationError = ProviderError::Cancelled.into();
        assert_eq!(cancelled.kind(), ErrorKind::Cancelled);
    }
}
