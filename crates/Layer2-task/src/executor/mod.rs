//! Command executors
//!
//! - `ExecutionRequest` - 명령 + 발급된 verdict + 사용자 확인 여부
//! - `LocalExecutor` - 호스트에서 프로세스 그룹 단위로 실행
//!
//! ## Fail-closed
//! 실행 직전에 verdict를 다시 확인한다. verdict가 없거나, 다른 명령에 발급됐거나,
//! 지금 다시 검증한 결과와 다르면(stale) `ExecutionRefused`.

mod local;
mod output;
mod request;
mod r#trait;

pub use local::{LocalExecutor, LocalExecutorConfig};
pub use output::{CappedBuffer, TRUNCATION_MARKER};
pub use r#trait::Executor;
pub use request::ExecutionRequest;
