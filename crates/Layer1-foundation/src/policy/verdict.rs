//! PolicyVerdict - 검증 결과

use crate::types::IntentSource;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 결정
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictOutcome {
    Allow,
    Deny,
    Confirm,
}

impl VerdictOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictOutcome::Allow => "allow",
            VerdictOutcome::Deny => "deny",
            VerdictOutcome::Confirm => "confirm",
        }
    }
}

impl std::fmt::Display for VerdictOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 위험 수준
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 검증 결과
///
/// 호출마다 새로 만들어지며 캐시하지 않는다. `subject`는 이 verdict가 발급된
/// 텍스트로, Executor가 다른 명령에 재사용되는 것을 막는 데 쓴다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyVerdict {
    pub outcome: VerdictOutcome,

    /// 매칭된 규칙 ID (기본값으로 결정됐으면 None)
    pub matched_rule: Option<String>,

    /// 사람이 읽을 사유
    pub reason: String,

    pub risk: RiskLevel,

    /// 검증 대상 텍스트
    pub subject: String,

    /// 검증 당시 출처
    pub source: IntentSource,

    pub issued_at: DateTime<Utc>,
}

impl PolicyVerdict {
    pub fn is_allowed(&self) -> bool {
        self.outcome == VerdictOutcome::Allow
    }

    pub fn is_denied(&self) -> bool {
        self.outcome == VerdictOutcome::Deny
    }

    pub fn needs_confirmation(&self) -> bool {
        self.outcome == VerdictOutcome::Confirm
    }

    /// deny면 `PolicyDenied` 에러로 변환
    pub fn into_result(self) -> Result<Self> {
        if self.is_denied() {
            Err(Error::PolicyDenied {
                rule: self.matched_rule,
                reason: self.reason,
            })
        } else {
            Ok(self)
        }
    }

    /// 한 줄 요약
    pub fn summary(&self) -> String {
        match &self.matched_rule {
            Some(rule) => format!("{} [{}] ({} risk): {}", self.outcome, rule, self.risk, self.reason),
            None => format!("{} ({} risk): {}", self.outcome, self.risk, self.reason),
        }
    }
}
