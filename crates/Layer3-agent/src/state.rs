//! Orchestrator 상태 머신
//!
//! ```text
//! AwaitingIntent ──► Validating ──► Executing ──► Analyzing ──► AwaitingIntent
//!                        │              ▲
//!                        ▼              │
//!                ExtendingCapability ───┘ (Validating을 한 번 더 거침)
//!                DetectingGap → Synthesizing → Integrating
//! ```
//!
//! 실패(거부, 합성 오류, 통합 거부, 취소)는 모두 `AwaitingIntent`로 돌아간다.

use serde::{Deserialize, Serialize};

/// 자기 확장 세부 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtensionPhase {
    DetectingGap,
    Synthesizing,
    Integrating,
}

impl ExtensionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtensionPhase::DetectingGap => "detecting-gap",
            ExtensionPhase::Synthesizing => "synthesizing",
            ExtensionPhase::Integrating => "integrating",
        }
    }
}

/// 턴 단위 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentState {
    /// 다음 입력 대기
    #[default]
    AwaitingIntent,
    /// 정책 검증 중
    Validating,
    /// 새 capability 생성 중
    ExtendingCapability(ExtensionPhase),
    /// 프로세스 실행 중 (유일한 장시간 대기 지점)
    Executing,
    /// 결과 분류 중
    Analyzing,
}

impl AgentState {
    pub fn is_idle(&self) -> bool {
        *self == AgentState::AwaitingIntent
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentState::AwaitingIntent => f.write_str("awaiting-intent"),
            AgentState::Validating => f.write_str("validating"),
            AgentState::ExtendingCapability(phase) => {
                write!(f, "extending-capability/{}", phase.as_str())
            }
            AgentState::Executing => f.write_str("executing"),
            AgentState::Analyzing => f.write_str("analyzing"),
        }
    }
}
