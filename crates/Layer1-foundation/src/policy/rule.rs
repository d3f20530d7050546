//! 정책 규칙 정의

use super::context::PolicyContext;
use super::verdict::RiskLevel;
use regex::Regex;
use std::path::Path;

/// 규칙이 검사하는 범위
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleScope {
    /// 명령 전체 (여러 줄이면 줄 단위)
    Command,
    /// verb를 제외한 개별 인자 토큰
    Argument,
    /// 경로 후보 (경로 인자, 쓰기 대상, 산출물 대상 경로)
    Path,
}

/// 규칙이 매칭됐을 때의 결정
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyAction {
    Allow,
    Deny,
    Confirm,
}

/// 매칭 패턴
#[derive(Debug, Clone)]
pub enum RulePattern {
    /// 세그먼트 전체가 정확히 일치
    Exact(String),
    /// 접두어 일치
    Prefix(String),
    /// 부분 문자열 포함
    Contains(String),
    /// 정규식
    Regex(Regex),
    /// 읽기 경로가 `..`로 작업 루트를 벗어나거나, 루트 밖 제한 경로를 가리키거나,
    /// 실행 전에는 알 수 없음 (명령 검증에서만)
    OutsideWorkingRoot,
    /// 쓰기 대상이 제한 디렉토리/민감 경로에 있음
    RestrictedWrite,
    /// 쓰기 대상이 허용 디렉토리 밖이거나 실행 전에는 알 수 없음
    OutsideWritableRoots,
    /// 산출물 대상 경로가 허용 디렉토리 안
    TargetInsideWritableRoots,
}

/// 정책 규칙
#[derive(Debug, Clone)]
pub struct PolicyRule {
    /// 규칙 ID (verdict.matched_rule)
    pub id: String,
    pub pattern: RulePattern,
    pub scope: RuleScope,
    pub action: PolicyAction,
    /// 높을수록 먼저 평가
    pub priority: i32,
    /// 매칭 시 사유
    pub reason: String,
    /// 위험도 (assess_risk용)
    pub risk: RiskLevel,
}

impl PolicyRule {
    pub fn new(
        id: impl Into<String>,
        pattern: RulePattern,
        scope: RuleScope,
        action: PolicyAction,
    ) -> Self {
        let (priority, risk) = match action {
            PolicyAction::Deny => (100, RiskLevel::Critical),
            PolicyAction::Confirm => (50, RiskLevel::Medium),
            PolicyAction::Allow => (10, RiskLevel::Low),
        };
        Self {
            id: id.into(),
            pattern,
            scope,
            action,
            priority,
            reason: String::new(),
            risk,
        }
    }

    /// 명령 범위 정규식 거부 규칙
    pub fn deny_regex(id: &str, pattern: &str, reason: &str) -> crate::Result<Self> {
        let re = compile(pattern)?;
        Ok(Self::new(id, RulePattern::Regex(re), RuleScope::Command, PolicyAction::Deny)
            .with_reason(reason))
    }

    /// 명령 범위 정규식 확인 규칙
    pub fn confirm_regex(id: &str, pattern: &str, reason: &str) -> crate::Result<Self> {
        let re = compile(pattern)?;
        Ok(Self::new(id, RulePattern::Regex(re), RuleScope::Command, PolicyAction::Confirm)
            .with_reason(reason))
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_risk(mut self, risk: RiskLevel) -> Self {
        self.risk = risk;
        self
    }

    /// 문자열 하나에 대한 텍스트 패턴 매칭
    fn matches_str(&self, value: &str) -> bool {
        match &self.pattern {
            RulePattern::Exact(s) => value.trim() == s,
            RulePattern::Prefix(s) => value.trim_start().starts_with(s.as_str()),
            RulePattern::Contains(s) => value.contains(s.as_str()),
            RulePattern::Regex(re) => re.is_match(value),
            _ => false,
        }
    }

    /// 평가 대상과 컨텍스트로 매칭 여부 판단
    pub(crate) fn matches(&self, subject: &Subject<'_>, ctx: &PolicyContext) -> bool {
        match &self.pattern {
            RulePattern::OutsideWorkingRoot => {
                ctx.target_path.is_none()
                    && (!subject.escaping_reads.is_empty() || !subject.unresolved_reads.is_empty())
            }
            RulePattern::RestrictedWrite => subject
                .write_paths
                .iter()
                .any(|p| ctx.is_restricted(p)),
            RulePattern::OutsideWritableRoots => {
                !subject.unresolved_writes.is_empty()
                    || subject.write_paths.iter().any(|p| !ctx.is_writable(p))
            }
            RulePattern::TargetInsideWritableRoots => ctx
                .target_path
                .as_deref()
                .map(|t| ctx.is_writable(&ctx.resolve(t)))
                .unwrap_or(false),
            _ => match self.scope {
                RuleScope::Command => {
                    self.matches_str(subject.text)
                        || subject.lines.iter().any(|l| self.matches_str(l))
                        || subject.segments.iter().any(|s| self.matches_str(s))
                }
                RuleScope::Argument => subject.arguments.iter().any(|a| self.matches_str(a)),
                RuleScope::Path => subject
                    .read_paths
                    .iter()
                    .chain(subject.write_paths.iter())
                    .any(|p| self.matches_str(&p.to_string_lossy())),
            },
        }
    }
}

fn compile(pattern: &str) -> crate::Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| crate::Error::Config(format!("invalid policy pattern '{}': {}", pattern, e)))
}

/// 평가 대상 텍스트를 미리 분해한 형태
#[derive(Debug, Default)]
pub(crate) struct Subject<'a> {
    pub text: &'a str,
    pub lines: Vec<&'a str>,
    pub segments: Vec<String>,
    pub verbs: Vec<String>,
    pub arguments: Vec<String>,
    /// 정규화된 읽기 경로
    pub read_paths: Vec<std::path::PathBuf>,
    /// 읽기 경로 중 작업 루트를 벗어나는 것 (`..` 또는 루트 밖 제한 경로)
    pub escaping_reads: Vec<std::path::PathBuf>,
    /// 정규화된 쓰기 경로
    pub write_paths: Vec<std::path::PathBuf>,
    /// 변수/명령 치환 때문에 해석할 수 없는 경로
    pub unresolved_reads: Vec<String>,
    pub unresolved_writes: Vec<String>,
}

impl Subject<'_> {
    pub fn verbs(&self) -> impl Iterator<Item = &str> {
        self.verbs.iter().map(String::as_str)
    }
}

pub(crate) fn path_is_under(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}
