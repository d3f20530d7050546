//! LLM 호출 재시도 - 지수 백오프 + jitter
//!
//! 재시도 여부는 `ProviderError::retry_hint()`가 정한다.
//! 취소 토큰은 호출 중에도, 대기 중에도 확인한다.

use crate::error::ProviderError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// 실패한 호출을 어떻게 다룰지
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryHint {
    /// 일시적 실패: 백오프 후 다시
    Backoff,
    /// 서버가 대기 시간을 알려줌 (없으면 백오프)
    After(Option<Duration>),
    /// 다시 해도 같은 결과
    GiveUp,
}

/// 재시도 설정
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 첫 호출을 포함한 최대 호출 수
    pub max_attempts: u32,
    /// 첫 대기 시간 (이후 두 배씩)
    pub base_delay: Duration,
    /// 대기 시간 상한 (서버가 알려준 값에도 적용)
    pub max_delay: Duration,
    /// 대기 시간을 ±20% 흔든다
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// 재시도 없이 한 번만 호출
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// `failed`번 실패한 뒤의 대기 시간 (1부터)
    pub fn backoff(&self, failed: u32) -> Duration {
        let exponent = failed.saturating_sub(1).min(16);
        let delay = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);
        if self.jitter {
            delay.mul_f64(0.8 + jitter_fraction() * 0.4)
        } else {
            delay
        }
    }

    fn wait_for(&self, hint: RetryHint, failed: u32) -> Duration {
        match hint {
            RetryHint::After(Some(wait)) => wait.min(self.max_delay),
            _ => self.backoff(failed),
        }
    }
}

fn jitter_fraction() -> f64 {
    let id = uuid::Uuid::new_v4();
    let bytes = id.as_bytes();
    u16::from_le_bytes([bytes[0], bytes[1]]) as f64 / u16::MAX as f64
}

/// `call`을 설정에 따라 재시도하며 실행
///
/// 취소되면 곧바로 `ProviderError::Cancelled`.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    label: &str,
    cancel: &CancellationToken,
    mut call: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut failed = 0;

    loop {
        let error = tokio::select! {
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            result = call() => match result {
                Ok(value) => return Ok(value),
                Err(error) => error,
            },
        };
        failed += 1;

        let hint = error.retry_hint();
        if hint == RetryHint::GiveUp {
            debug!("{}: giving up after attempt {}: {}", label, failed, error);
            return Err(error);
        }
        if failed >= max_attempts {
            warn!("{}: failed {} times, last error: {}", label, failed, error);
            return Err(error);
        }

        let wait = config.wait_for(hint, failed);
        warn!("{}: {} (attempt {}/{}), waiting {:?}", label, error, failed, max_attempts, wait);

        tokio::select! {
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            _ = tokio::time::sleep(wait) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: false,
        }
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let config = RetryConfig {
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
            jitter: false,
            ..RetryConfig::default()
        };
        assert_eq!(config.backoff(1), Duration::from_millis(250));
        assert_eq!(config.backoff(2), Duration::from_millis(500));
        assert_eq!(config.backoff(3), Duration::from_millis(1000));
        assert_eq!(config.backoff(10), Duration::from_secs(2));
    }

    #[test]
    fn test_server_wait_is_capped() {
        let config = quick(3);
        let hint = RetryHint::After(Some(Duration::from_secs(60)));
        assert_eq!(config.wait_for(hint, 1), Duration::from_millis(5));
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&quick(3), "test", &CancellationToken::new(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(ProviderError::ServerError("502".into()))
                } else {
                    Ok("reply")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "reply");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&quick(5), "test", &CancellationToken::new(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::Authentication("bad key".into())) }
        })
        .await;
        assert!(matches!(result, Err(ProviderError::Authentication(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stops_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&quick(2), "test", &CancellationToken::new(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::Network("reset".into())) }
        })
        .await;
        assert!(matches!(result, Err(ProviderError::Network(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_token_wins() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<(), _> =
            with_retry(&quick(3), "test", &cancel, std::future::pending).await;
        assert_eq!(result.unwrap_err(), ProviderError::Cancelled);
    }
}
