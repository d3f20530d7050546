//! Executor trait

use super::request::ExecutionRequest;
use anvil_foundation::{ExecutionResult, Result};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Executor trait - implement to add new execution backends
///
/// 0이 아닌 종료 코드와 타임아웃은 에러가 아니라 `ExecutionResult`로 보고한다.
/// 에러는 실행 거부(`ExecutionRefused`), 취소(`Cancelled`), 프로세스 생성 실패뿐이다.
#[async_trait]
pub trait Executor: Send + Sync {
    /// 승인된 요청 실행
    async fn execute(
        &self,
        request: &ExecutionRequest,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult>;

    /// Check if the executor is available
    fn is_available(&self) -> bool {
        true
    }

    /// Get executor name
    fn name(&self) -> &'static str;
}
