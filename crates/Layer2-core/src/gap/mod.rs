//! Gap Detector - 요청을 기존 capability로 처리할 수 있는지 판단
//!
//! ```text
//! intent ──► registry 매칭 ──► Resolution (구체 명령)
//!              │ 없음
//!              ▼
//!          PATH / 셸 builtin ──► passthrough (gap 아님)
//!              │ 없음
//!              ▼
//!          키워드 휴리스틱 ──► CapabilityGap { missing_kind, confidence, ... }
//! ```
//!
//! 두 가지 경로:
//! - proactive: 실행 전 `detect`
//! - reactive: 실행 후 command-not-found로 실패했을 때 `detect_reactive`

mod heuristics;

pub use heuristics::{estimate_kind, sanitize_name, suggest_name, KindEstimate, MAX_CONFIDENCE, MIN_CONFIDENCE};

use crate::registry::CapabilityRegistry;
use crate::template::{spec_for, ArtifactManifest};
use anvil_foundation::{CapabilityKind, CapabilityRecord, CommandIntent, Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// 셸 자체가 처리하는 명령 (PATH에 없어도 passthrough)
const SHELL_BUILTINS: &[&str] = &[
    "cd", "echo", "printf", "export", "unset", "set", "alias", "unalias", "type", "true", "false",
    "test", "[", "read", "source", ".", "exit", "command", "eval", "exec", "ulimit", "umask",
    "wait", "jobs", "kill", "hash", "times", "trap", "shift", "getopts",
];

// ============================================================================
// 데이터 타입
// ============================================================================

/// gap이 발견된 경로
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GapTrigger {
    /// 실행 전 (verb가 registry에도 PATH에도 없음)
    Proactive,
    /// 실행 후 (missing capability로 실패)
    Reactive,
}

/// 빠진 capability 설명 (저장하지 않는 일시 값)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityGap {
    pub requested_intent_ref: Uuid,
    pub missing_kind: CapabilityKind,
    pub suggested_template_id: String,
    /// 0.3 ~ 0.95
    pub confidence: f32,
    /// 원래 요청 텍스트
    pub request_text: String,
    /// 새 capability 이름 후보
    pub suggested_name: String,
    /// 키워드 적중 수 (0이면 휴리스틱 근거 없음)
    pub keyword_hits: usize,
    pub trigger: GapTrigger,
}

impl CapabilityGap {
    /// 키워드 근거가 있는지 (없으면 일반 대화/질문일 가능성이 큼)
    pub fn has_evidence(&self) -> bool {
        self.keyword_hits > 0 || self.trigger == GapTrigger::Reactive
    }

    pub fn summary(&self) -> String {
        format!(
            "missing {} '{}' (template {}, confidence {:.2})",
            self.missing_kind, self.suggested_name, self.suggested_template_id, self.confidence
        )
    }
}

/// registry의 capability로 intent를 처리하는 구체 명령
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub record: CapabilityRecord,
    pub command: String,
}

// ============================================================================
// GapDetector
// ============================================================================

/// Gap Detector - registry를 유일한 근거로 사용
pub struct GapDetector {
    registry: Arc<CapabilityRegistry>,

    /// PATH 조회 여부 (끄면 셸 builtin만 passthrough)
    path_lookup: bool,
}

impl GapDetector {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            registry,
            path_lookup: true,
        }
    }

    /// PATH 조회 없이 동작 (테스트 환경과 무관한 결과가 필요할 때)
    pub fn without_path_lookup(mut self) -> Self {
        self.path_lookup = false;
        self
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    // ========================================================================
    // 매칭 / 해석
    // ========================================================================

    /// intent를 처리할 수 있는 active 레코드
    ///
    /// 1. verb가 이름/호출 verb와 일치
    /// 2. 확장 capability 이름이 요청 단어에 포함
    /// 3. verb가 키워드이고 키워드 적중 2개 이상 (피연산자가 필요한 builtin은 경로 인자 필수)
    pub fn match_record(&self, intent: &CommandIntent) -> Option<CapabilityRecord> {
        if intent.is_empty() {
            return None;
        }
        let verb = intent.parsed_verb.as_str();
        let active = self.registry.active();

        if let Some(record) = active.iter().find(|r| r.name == verb || r.verb() == verb) {
            return Some(record.clone());
        }

        let words = intent.words();
        if let Some(record) = active
            .iter()
            .filter(|r| r.kind.is_extension())
            .find(|r| words.iter().any(|w| *w == r.name))
        {
            return Some(record.clone());
        }

        let has_paths = !intent.path_arguments().is_empty();
        active
            .iter()
            .filter(|r| r.keywords.iter().any(|k| k.as_str() == verb))
            .filter(|r| has_paths || !requires_operand(r))
            .map(|r| {
                let hits = words.iter().filter(|w| r.keywords.contains(w)).count();
                (r, hits)
            })
            .filter(|(_, hits)| *hits >= 2)
            .fold(None, |best: Option<(&CapabilityRecord, usize)>, candidate| match best {
                Some(b) if b.1 >= candidate.1 => Some(b),
                _ => Some(candidate),
            })
            .map(|(record, _)| record.clone())
    }

    /// intent를 registry capability의 구체 명령으로 변환
    pub fn resolve(&self, intent: &CommandIntent) -> Result<Option<Resolution>> {
        let Some(record) = self.match_record(intent) else {
            return Ok(None);
        };

        let command = self.render(&record, intent)?;
        debug!("Resolved '{}' via {} '{}': {}", intent.raw_text, record.kind, record.name, command);
        Ok(Some(Resolution { record, command }))
    }

    /// 특정 레코드로 intent를 구체 명령으로 변환
    pub fn render(&self, record: &CapabilityRecord, intent: &CommandIntent) -> Result<String> {
        if record.kind == CapabilityKind::Builtin {
            return Ok(render_builtin(record, intent));
        }

        let path = record.source_path().ok_or_else(|| {
            Error::Storage(format!("capability '{}' has no source location", record.name))
        })?;
        let manifest = ArtifactManifest::load(path)?;
        if manifest.kind() != record.kind {
            return Err(Error::Storage(format!(
                "manifest kind {} does not match registered kind {} for '{}'",
                manifest.kind(),
                record.kind,
                record.name
            )));
        }
        Ok(manifest.render(intent))
    }

    /// 셸이 그대로 실행할 수 있는 verb인지
    pub fn is_passthrough(&self, verb: &str) -> bool {
        if verb.is_empty() {
            return false;
        }
        if SHELL_BUILTINS.contains(&verb) || verb.contains('/') {
            return true;
        }
        self.path_lookup && which::which(verb).is_ok()
    }

    // ========================================================================
    // Gap 탐지
    // ========================================================================

    /// proactive 탐지: registry에도 없고 passthrough도 아니면 gap
    pub fn detect(&self, intent: &CommandIntent) -> Option<CapabilityGap> {
        if intent.is_empty() || self.match_record(intent).is_some() {
            return None;
        }
        if self.is_passthrough(&intent.parsed_verb) {
            debug!("'{}' is a raw-shell passthrough", intent.parsed_verb);
            return None;
        }

        let words = intent.words();
        let estimate = estimate_kind(&words);
        let name = suggest_name(&words, estimate.kind);
        Some(self.gap(intent, estimate, name, GapTrigger::Proactive))
    }

    /// reactive 탐지: 실행 결과에서 빠진 명령 이름(`missing`)을 얻었을 때
    ///
    /// 같은 이름이 이미 active면 gap이 아니다.
    pub fn detect_reactive(&self, intent: &CommandIntent, missing: &str) -> Option<CapabilityGap> {
        let name = sanitize_name(missing);
        if name.is_empty() {
            return None;
        }
        if self.registry.get(&name).map_or(false, |r| r.is_active()) {
            debug!("'{}' is already registered, not a gap", name);
            return None;
        }

        let mut words = intent.words();
        words.push(name.clone());
        let estimate = estimate_kind(&words);
        Some(self.gap(intent, estimate, name, GapTrigger::Reactive))
    }

    fn gap(
        &self,
        intent: &CommandIntent,
        estimate: KindEstimate,
        name: String,
        trigger: GapTrigger,
    ) -> CapabilityGap {
        let template_id = spec_for(estimate.kind)
            .map(|spec| spec.id.to_string())
            .unwrap_or_default();
        let gap = CapabilityGap {
            requested_intent_ref: intent.id,
            missing_kind: estimate.kind,
            suggested_template_id: template_id,
            confidence: estimate.confidence,
            request_text: intent.raw_text.clone(),
            suggested_name: name,
            keyword_hits: estimate.hits,
            trigger,
        };
        debug!("Gap detected ({:?}): {}", trigger, gap.summary());
        gap
    }
}

fn requires_operand(record: &CapabilityRecord) -> bool {
    record.kind == CapabilityKind::Builtin && record.invocation_grammar.contains('<')
}

/// builtin: verb가 같으면 원문 그대로, 키워드로 매칭됐으면 이름 + 경로 인자
fn render_builtin(record: &CapabilityRecord, intent: &CommandIntent) -> String {
    if intent.parsed_verb == record.name {
        return intent.raw_text.clone();
    }
    let paths = intent.path_arguments();
    shlex::try_join(std::iter::once(record.name.as_str()).chain(paths))
        .unwrap_or_else(|_| record.name.clone())
}
