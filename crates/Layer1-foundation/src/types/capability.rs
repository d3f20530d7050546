//! Capability 데이터 모델

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

// ============================================================================
// CapabilityKind
// ============================================================================

/// Capability 종류 (닫힌 집합)
///
/// 새 인스턴스는 데이터로만 추가되며, 종류마다 호출 문법 스키마가 고정되어 있다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CapabilityKind {
    /// 내장 명령 (ls, cat, ...)
    Builtin,
    /// 합성된 CLI 스타일 명령 (스크립트)
    Command,
    /// 여러 action을 가진 플러그인
    Plugin,
    /// 구조화 컨텍스트 템플릿
    Template,
    /// 컨테이너/환경 정의
    EnvironmentDef,
}

impl CapabilityKind {
    /// 자기 확장으로 생성 가능한 종류 (덜 침습적인 순서)
    pub const EXTENSIONS: [CapabilityKind; 4] = [
        CapabilityKind::Command,
        CapabilityKind::Template,
        CapabilityKind::Plugin,
        CapabilityKind::EnvironmentDef,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityKind::Builtin => "builtin",
            CapabilityKind::Command => "command",
            CapabilityKind::Plugin => "plugin",
            CapabilityKind::Template => "template",
            CapabilityKind::EnvironmentDef => "environment-def",
        }
    }

    /// 침습도 (낮을수록 검증 부담이 적음)
    pub fn invasiveness(&self) -> u8 {
        match self {
            CapabilityKind::Builtin => 0,
            CapabilityKind::Command => 1,
            CapabilityKind::Template => 2,
            CapabilityKind::Plugin => 3,
            CapabilityKind::EnvironmentDef => 4,
        }
    }

    pub fn is_extension(&self) -> bool {
        !matches!(self, CapabilityKind::Builtin)
    }
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CapabilityKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "builtin" => Ok(CapabilityKind::Builtin),
            "command" => Ok(CapabilityKind::Command),
            "plugin" => Ok(CapabilityKind::Plugin),
            "template" => Ok(CapabilityKind::Template),
            "environment-def" | "environment" | "env" => Ok(CapabilityKind::EnvironmentDef),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown capability kind: {}",
                other
            ))),
        }
    }
}

// ============================================================================
// CapabilityStatus
// ============================================================================

/// 등록 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CapabilityStatus {
    Active,
    PendingValidation,
    Rejected,
}

impl CapabilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityStatus::Active => "active",
            CapabilityStatus::PendingValidation => "pending-validation",
            CapabilityStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for CapabilityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// CapabilityRecord
// ============================================================================

/// 레지스트리 항목
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityRecord {
    /// 고유 키
    pub name: String,

    /// 종류
    pub kind: CapabilityKind,

    /// 호출 문법 (예: `docker <action> [args...]`)
    pub invocation_grammar: String,

    /// 영속화된 산출물 위치 (builtin은 없음)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_location: Option<PathBuf>,

    /// 상태
    pub status: CapabilityStatus,

    /// 설명
    #[serde(default)]
    pub description: String,

    /// 의도 매칭용 키워드
    #[serde(default)]
    pub keywords: Vec<String>,

    /// 버전 (교체될 때마다 증가)
    #[serde(default = "default_version")]
    pub version: u32,

    /// 생성 시각
    pub created_at: DateTime<Utc>,

    /// 거부 사유 (rejected일 때만)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

fn default_version() -> u32 {
    1
}

impl CapabilityRecord {
    pub fn new(
        name: impl Into<String>,
        kind: CapabilityKind,
        invocation_grammar: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            invocation_grammar: invocation_grammar.into(),
            source_location: None,
            status: CapabilityStatus::PendingValidation,
            description: String::new(),
            keywords: Vec::new(),
            version: 1,
            created_at: Utc::now(),
            rejection_reason: None,
        }
    }

    /// 내장 명령 레코드 (항상 active)
    pub fn builtin(name: &str, grammar: &str, description: &str, keywords: &[&str]) -> Self {
        Self::new(name, CapabilityKind::Builtin, grammar)
            .with_status(CapabilityStatus::Active)
            .with_description(description)
            .with_keywords(keywords.iter().map(|k| k.to_string()).collect())
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_location = Some(path.into());
        self
    }

    pub fn with_status(mut self, status: CapabilityStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// 거부 상태로 전환
    pub fn rejected(mut self, reason: impl Into<String>) -> Self {
        self.status = CapabilityStatus::Rejected;
        self.rejection_reason = Some(reason.into());
        self
    }

    /// 호출 문법의 첫 토큰
    pub fn verb(&self) -> &str {
        self.invocation_grammar
            .split_whitespace()
            .next()
            .unwrap_or(&self.name)
    }

    pub fn is_active(&self) -> bool {
        self.status == CapabilityStatus::Active
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_location.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serde_names() {
        let json = serde_json::to_string(&CapabilityKind::EnvironmentDef).unwrap();
        assert_eq!(json, "\"environment-def\"");
        let status = serde_json::to_string(&CapabilityStatus::PendingValidation).unwrap();
        assert_eq!(status, "\"pending-validation\"");
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("plugin".parse::<CapabilityKind>().unwrap(), CapabilityKind::Plugin);
        assert_eq!("env".parse::<CapabilityKind>().unwrap(), CapabilityKind::EnvironmentDef);
        assert!("widget".parse::<CapabilityKind>().is_err());
    }

    #[test]
    fn test_invasiveness_order() {
        let mut kinds = CapabilityKind::EXTENSIONS.to_vec();
        kinds.sort_by_key(|k| k.invasiveness());
        assert_eq!(kinds, CapabilityKind::EXTENSIONS.to_vec());
    }

    #[test]
    fn test_builtin_record() {
        let record = CapabilityRecord::builtin("ls", "ls [path...]", "list files", &["list", "files"]);
        assert!(record.is_active());
        assert_eq!(record.verb(), "ls");
        assert!(record.source_location.is_none());

        let rejected = record.rejected("nope");
        assert_eq!(rejected.status, CapabilityStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("nope"));
    }
}
