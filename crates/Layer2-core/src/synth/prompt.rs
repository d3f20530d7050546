//! 합성 프롬프트 스캐폴드
//!
//! 종류별 템플릿 설명과 정식 예시로 파라미터화된 고정 프롬프트.

use crate::gap::CapabilityGap;
use crate::template::TemplateSpec;

/// 합성용 시스템 프롬프트
pub const SYNTHESIS_SYSTEM_PROMPT: &str = "You generate capability manifests for a command-line agent. \
Reply with exactly one JSON object and nothing else. Commands must stay inside the working directory, \
must not use sudo, and must not write outside the agent's plugin, template or environment directories.";

/// 최초 합성 프롬프트
pub fn synthesis_prompt(gap: &CapabilityGap, spec: &TemplateSpec) -> String {
    format!(
        "Create a new {kind} capability to serve this request:\n\n\
         Request: {request}\n\
         Capability name: {name} (use exactly this value for \"name\")\n\
         Template: {id}\n\
         Required fields: {fields}\n\n\
         {guidance}\n\n\
         Canonical example of a {id} manifest:\n\
         ```json\n{example}\n```\n\n\
         Respond with the JSON manifest only.",
        kind = gap.missing_kind,
        request = gap.request_text,
        name = gap.suggested_name,
        id = spec.id,
        fields = spec.required_fields.join(", "),
        guidance = spec.guidance,
        example = spec.example,
    )
}

/// 구조 검사 실패 후 한 번만 보내는 교정 프롬프트
pub fn corrective_prompt(spec: &TemplateSpec, previous: &str, problem: &str) -> String {
    format!(
        "Your previous reply could not be used as a {id} manifest.\n\n\
         Problem: {problem}\n\n\
         Previous reply:\n{previous}\n\n\
         Return a corrected JSON object with all of these fields: {fields}. \
         Do not include any text outside the JSON object.",
        id = spec.id,
        problem = problem,
        previous = truncate(previous, 4000),
        fields = spec.required_fields.join(", "),
    )
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}\n...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gap::GapTrigger;
    use crate::template::spec_for;
    use anvil_foundation::CapabilityKind;
    use uuid::Uuid;

    fn gap() -> CapabilityGap {
        CapabilityGap {
            requested_intent_ref: Uuid::new_v4(),
            missing_kind: CapabilityKind::Plugin,
            suggested_template_id: "plugin.v1".into(),
            confidence: 0.9,
            request_text: "manage docker containers".into(),
            suggested_name: "docker".into(),
            keyword_hits: 3,
            trigger: GapTrigger::Proactive,
        }
    }

    #[test]
    fn test_prompt_contains_example_and_name() {
        let spec = spec_for(CapabilityKind::Plugin).unwrap();
        let prompt = synthesis_prompt(&gap(), spec);
        assert!(prompt.contains("manage docker containers"));
        assert!(prompt.contains("Capability name: docker"));
        assert!(prompt.contains(spec.example));
        assert!(prompt.contains("name, description, version, actions"));
    }

    #[test]
    fn test_corrective_prompt_truncates() {
        let spec = spec_for(CapabilityKind::Command).unwrap();
        let long = "x".repeat(5000);
        let prompt = corrective_prompt(spec, &long, "missing script");
        assert!(prompt.contains("missing script"));
        assert!(prompt.len() < 5000);
    }
}
