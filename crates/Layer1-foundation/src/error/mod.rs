//! Error types for Anvil
//!
//! 모든 에러를 중앙에서 관리
//!
//! 파이프라인 에러는 모두 복구 가능(recoverable)하며, 사람이 읽을 메시지와
//! 테스트에서 단언할 수 있는 구조화된 정보(kind + reason)를 함께 제공합니다.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Anvil 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 보안 게이트
    // ========================================================================
    #[error("Policy denied{}: {reason}", .rule.as_ref().map(|r| format!(" by rule '{}'", r)).unwrap_or_default())]
    PolicyDenied {
        rule: Option<String>,
        reason: String,
    },

    #[error("Execution refused: {0}")]
    ExecutionRefused(String),

    // ========================================================================
    // 실행
    // ========================================================================
    #[error("Execution timed out after {timeout_secs}s: {command}")]
    ExecutionTimeout { command: String, timeout_secs: u64 },

    #[error("Cancelled: {0}")]
    Cancelled(String),

    // ========================================================================
    // 자기 확장 (Self-Extension)
    // ========================================================================
    #[error("Synthesis schema error: {0}")]
    SynthesisSchemaError(String),

    #[error("Integration rejected: {0}")]
    IntegrationRejected(String),

    #[error("LLM unavailable: {0}")]
    LlmUnavailable(String),

    #[error("Duplicate capability: {0}")]
    DuplicateCapability(String),

    #[error("Capability not found: {0}")]
    CapabilityNotFound(String),

    // ========================================================================
    // 설정 / 저장소
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// 에러 분류 (테스트 단언 및 리포트용)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    PolicyDenied,
    ExecutionRefused,
    ExecutionTimeout,
    Cancelled,
    SynthesisSchemaError,
    IntegrationRejected,
    LlmUnavailable,
    DuplicateCapability,
    CapabilityNotFound,
    Config,
    Storage,
    InvalidInput,
    Io,
    Json,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::PolicyDenied => "PolicyDenied",
            ErrorKind::ExecutionRefused => "ExecutionRefused",
            ErrorKind::ExecutionTimeout => "ExecutionTimeout",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::SynthesisSchemaError => "SynthesisSchemaError",
            ErrorKind::IntegrationRejected => "IntegrationRejected",
            ErrorKind::LlmUnavailable => "LLMUnavailable",
            ErrorKind::DuplicateCapability => "DuplicateCapability",
            ErrorKind::CapabilityNotFound => "CapabilityNotFound",
            ErrorKind::Config => "Config",
            ErrorKind::Storage => "Storage",
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::Io => "Io",
            ErrorKind::Json => "Json",
            ErrorKind::Internal => "Internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// 에러 종류
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::PolicyDenied { .. } => ErrorKind::PolicyDenied,
            Error::ExecutionRefused(_) => ErrorKind::ExecutionRefused,
            Error::ExecutionTimeout { .. } => ErrorKind::ExecutionTimeout,
            Error::Cancelled(_) => ErrorKind::Cancelled,
            Error::SynthesisSchemaError(_) => ErrorKind::SynthesisSchemaError,
            Error::IntegrationRejected(_) => ErrorKind::IntegrationRejected,
            Error::LlmUnavailable(_) => ErrorKind::LlmUnavailable,
            Error::DuplicateCapability(_) => ErrorKind::DuplicateCapability,
            Error::CapabilityNotFound(_) => ErrorKind::CapabilityNotFound,
            Error::Config(_) => ErrorKind::Config,
            Error::Storage(_) => ErrorKind::Storage,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Io(_) => ErrorKind::Io,
            Error::Json(_) => ErrorKind::Json,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// 사람이 읽을 수 있는 사유 (variant 접두어 제외)
    pub fn reason(&self) -> String {
        match self {
            Error::PolicyDenied { reason, .. } => reason.clone(),
            Error::ExecutionTimeout {
                command,
                timeout_secs,
            } => format!("'{}' exceeded {}s", command, timeout_secs),
            Error::ExecutionRefused(msg)
            | Error::Cancelled(msg)
            | Error::SynthesisSchemaError(msg)
            | Error::IntegrationRejected(msg)
            | Error::LlmUnavailable(msg)
            | Error::DuplicateCapability(msg)
            | Error::CapabilityNotFound(msg)
            | Error::Config(msg)
            | Error::Storage(msg)
            | Error::InvalidInput(msg)
            | Error::Internal(msg) => msg.clone(),
            Error::Io(e) => e.to_string(),
            Error::Json(e) => e.to_string(),
        }
    }

    /// 세션을 유지한 채 복구 가능한지
    ///
    /// 시작 시 설정 오류만 프로세스를 종료시킨다.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::Config(_))
    }

    /// 사용자에게 그대로 보여줄 에러인지
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::PolicyDenied { .. }
                | Error::ExecutionRefused(_)
                | Error::ExecutionTimeout { .. }
                | Error::SynthesisSchemaError(_)
                | Error::IntegrationRejected(_)
                | Error::LlmUnavailable(_)
                | Error::DuplicateCapability(_)
                | Error::Config(_)
        )
    }

    /// 정책 거부 에러 생성
    pub fn policy_denied(rule: Option<&str>, reason: impl Into<String>) -> Self {
        Error::PolicyDenied {
            rule: rule.map(String::from),
            reason: reason.into(),
        }
    }

    /// 타임아웃 에러 생성
    pub fn timeout(command: impl Into<String>, timeout_secs: u64) -> Self {
        Error::ExecutionTimeout {
            command: command.into(),
            timeout_secs,
        }
    }

    /// 구조화된 리포트로 변환
    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            reason: self.reason(),
        }
    }
}

/// 표시 및 테스트 단언용 구조화 에러
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub reason: String,
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.reason)
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_denied_display_includes_rule() {
        let err = Error::policy_denied(Some("fork-bomb"), "fork bomb detected");
        assert_eq!(
            err.to_string(),
            "Policy denied by rule 'fork-bomb': fork bomb detected"
        );
        assert_eq!(err.kind(), ErrorKind::PolicyDenied);
        assert_eq!(err.reason(), "fork bomb detected");
    }

    #[test]
    fn test_only_config_is_fatal() {
        assert!(!Error::Config("missing api key".into()).is_recoverable());
        assert!(Error::LlmUnavailable("network".into()).is_recoverable());
        assert!(Error::timeout("sleep 60", 30).is_recoverable());
        assert!(Error::DuplicateCapability("docker".into()).is_recoverable());
    }

    #[test]
    fn test_report_kind_names() {
        let report = Error::LlmUnavailable("rate limited".into()).to_report();
        assert_eq!(report.kind.as_str(), "LLMUnavailable");
        assert_eq!(report.to_string(), "LLMUnavailable: rate limited");
    }
}
