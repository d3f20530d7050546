//! # anvil-task
//!
//! Command execution and outcome analysis for Anvil.
//!
//! ## Features
//!
//! - Fail-closed 실행: verdict가 없거나 stale이면 `ExecutionRefused`
//! - 프로세스 그룹 단위 타임아웃/취소
//! - 출력 크기 상한 + 잘림 표식
//! - 실행 결과 분류 (success / partial / failure / needs-retry)

pub mod executor;
pub mod outcome;

pub use executor::{
    CappedBuffer, ExecutionRequest, Executor, LocalExecutor, LocalExecutorConfig,
    TRUNCATION_MARKER,
};
pub use outcome::{Outcome, OutcomeAnalyzer, OutcomeStatus, COMMAND_NOT_FOUND_EXIT_CODE};
