//! ExecutionResult

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// 타임아웃 시 보고하는 종료 코드
pub const TIMEOUT_EXIT_CODE: i32 = -1;

/// 실행 결과
///
/// Executor가 생성하고 Outcome Analyzer가 한 번 소비한 뒤 대화 기록으로 옮겨진다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// 종료 코드 (타임아웃이면 `TIMEOUT_EXIT_CODE`)
    pub exit_code: i32,

    pub stdout: String,

    pub stderr: String,

    /// 실행 시간
    pub duration: Duration,

    /// 원래 intent ID
    pub intent_ref: Uuid,

    /// 실제로 실행한 명령
    pub command: String,

    /// 타임아웃 여부
    #[serde(default)]
    pub timed_out: bool,

    /// 출력 상한으로 잘렸는지
    #[serde(default)]
    pub truncated: bool,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// stdout + 빈 줄 + stderr
    pub fn combined_output(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (false, false) => format!("{}\n\n{}", self.stdout.trim_end(), self.stderr.trim_end()),
            (false, true) => self.stdout.trim_end().to_string(),
            (true, false) => self.stderr.trim_end().to_string(),
            (true, true) => String::new(),
        }
    }
}
