//! Policy - 명령/산출물 보안 게이트
//!
//! 모든 명령과 자기 확장 산출물은 실행 또는 저장 전에 여기를 통과한다.
//! - `PolicyRule`: {pattern, scope, action, priority} 순서 있는 규칙
//! - `PolicyContext`: 작업 루트, 쓰기 허용 디렉토리, 요청 출처
//! - `PolicyValidator`: 순수 평가기 (`validate(text, context) -> PolicyVerdict`)
//!
//! ## 평가 순서
//!
//! ```text
//! 빈 명령 / 길이 초과 → deny
//!        │
//!        ▼
//! 규칙 (priority 내림차순, 같으면 선언 순서) → 첫 매칭 규칙의 action
//!        │ (매칭 없음)
//!        ▼
//! 출처별 기본값: self-extension → deny
//!               safe verb 전용 → allow
//!               그 외 (user, llm) → confirm
//! ```

mod context;
mod defaults;
mod rule;
mod shell;
mod validator;
mod verdict;

pub use context::PolicyContext;
pub use defaults::{builtin_rules, restricted_roots, safe_verbs, sensitive_patterns};
pub use rule::{PolicyAction, PolicyRule, RulePattern, RuleScope};
pub use shell::{split_segments, write_targets};
pub use validator::{PolicyValidator, DEFAULT_MAX_COMMAND_LENGTH};
pub use verdict::{PolicyVerdict, RiskLevel, VerdictOutcome};
