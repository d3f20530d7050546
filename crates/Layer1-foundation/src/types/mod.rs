//! Types - 파이프라인 전 구간에서 공유되는 데이터 모델
//!
//! - `CommandIntent`: 한 턴의 사용자/LLM/자기확장 요청 (파싱 후 불변)
//! - `CapabilityRecord`: 레지스트리에 등록되는 capability 정보
//! - `ExecutionResult`: Executor 실행 결과

mod capability;
mod execution;
mod intent;

pub use capability::{CapabilityKind, CapabilityRecord, CapabilityStatus};
pub use execution::{ExecutionResult, TIMEOUT_EXIT_CODE};
pub use intent::{extract_command, tokenize, CommandIntent, IntentSource};
