//! Orchestrator가 내보내는 이벤트

use crate::state::AgentState;
use anvil_foundation::{CapabilityRecord, PolicyVerdict};

/// Events emitted by the orchestrator during a turn
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// 상태 전이
    StateChanged { from: AgentState, to: AgentState },

    /// 정책 판정 (명령 또는 산출물)
    Verdict {
        subject: String,
        verdict: PolicyVerdict,
    },

    /// 실행 출력
    Output {
        command: String,
        stdout: String,
        stderr: String,
        exit_code: i32,
    },

    /// 새 capability가 통합됨 (또는 거부됨)
    Extended(CapabilityRecord),

    /// 사용자에게 보여줄 안내 (degraded mode, 제안 등)
    Notice(String),

    /// 턴 종료
    TurnFinished { success: bool },
}
