//! 키워드 기반 capability 종류 추정

use anvil_foundation::CapabilityKind;

/// 신뢰도 하한 (근거가 없을 때의 값)
pub const MIN_CONFIDENCE: f32 = 0.3;
/// 신뢰도 상한
pub const MAX_CONFIDENCE: f32 = 0.95;

/// 종류별 키워드 (덜 침습적인 순서 = 동점 시 우선순위)
const KIND_KEYWORDS: &[(CapabilityKind, &[&str])] = &[
    (
        CapabilityKind::Command,
        &[
            "command", "script", "convert", "count", "rename", "backup", "compress", "archive",
            "calculate", "format", "cleanup", "clean", "resize", "extract", "checksum", "alias",
            "shortcut", "automate", "batch",
        ],
    ),
    (
        CapabilityKind::Template,
        &[
            "template", "prompt", "context", "summarize", "summary", "report", "review", "explain",
            "structured", "outline", "analyze", "analysis", "document", "mcp", "checklist",
        ],
    ),
    (
        CapabilityKind::Plugin,
        &[
            "plugin", "manage", "docker", "container", "kubernetes", "kubectl", "k8s", "service",
            "integration", "api", "database", "deploy", "monitor", "cloud", "server", "workflow",
        ],
    ),
    (
        CapabilityKind::EnvironmentDef,
        &[
            "environment", "env", "image", "dockerfile", "runtime", "sandbox", "virtualenv", "venv",
            "toolchain", "isolated", "nodejs", "node", "python", "setup",
        ],
    ),
];

/// 이름 후보에서 건너뛰는 일반 단어
const GENERIC_WORDS: &[&str] = &[
    "a", "an", "the", "to", "for", "of", "in", "on", "with", "and", "or", "my", "me", "i",
    "please", "can", "you", "could", "would", "want", "need", "new", "some", "all", "that",
    "this", "it", "is", "be", "help", "make", "create", "build", "add", "write", "generate", "get",
    "set", "run", "use", "manage", "handle", "do", "show", "list", "tool", "command", "script",
    "plugin", "template", "environment", "env", "capability", "which", "what", "how", "let",
    "lets", "up", "from", "into",
];

/// 종류 추정 결과
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KindEstimate {
    pub kind: CapabilityKind,
    pub confidence: f32,
    /// 이긴 종류의 키워드 적중 수
    pub hits: usize,
}

fn keyword_matches(word: &str, keyword: &str) -> bool {
    word == keyword || word.strip_suffix('s') == Some(keyword)
}

/// 단어 목록으로 빠진 capability 종류 추정
///
/// 신뢰도 = 이긴 종류 적중 수 / 전체 적중 수, [0.3, 0.95]로 제한.
/// 적중이 없으면 `command`, 0.3.
pub fn estimate_kind(words: &[String]) -> KindEstimate {
    let counts: Vec<(CapabilityKind, usize)> = KIND_KEYWORDS
        .iter()
        .map(|(kind, keywords)| {
            let hits = words
                .iter()
                .filter(|w| keywords.iter().any(|k| keyword_matches(w, k)))
                .count();
            (*kind, hits)
        })
        .collect();

    let total: usize = counts.iter().map(|(_, n)| n).sum();
    if total == 0 {
        return KindEstimate {
            kind: CapabilityKind::Command,
            confidence: MIN_CONFIDENCE,
            hits: 0,
        };
    }

    // 동점이면 먼저 나온 (덜 침습적인) 종류 유지
    let mut best = counts[0];
    for candidate in &counts[1..] {
        if candidate.1 > best.1 {
            best = *candidate;
        }
    }

    KindEstimate {
        kind: best.0,
        confidence: (best.1 as f32 / total as f32).clamp(MIN_CONFIDENCE, MAX_CONFIDENCE),
        hits: best.1,
    }
}

/// 첫 번째 비일반 단어를 `[a-z0-9_-]`로 정리한 이름
pub fn suggest_name(words: &[String], kind: CapabilityKind) -> String {
    words
        .iter()
        .filter(|w| !GENERIC_WORDS.contains(&w.as_str()))
        .map(|w| sanitize_name(w))
        .find(|w| !w.is_empty())
        .unwrap_or_else(|| format!("custom-{}", kind.as_str()))
}

/// 소문자 `[a-z0-9_-]`만 남기고 앞쪽의 `-`/`_` 제거
pub fn sanitize_name(raw: &str) -> String {
    let cleaned: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '-')
        .collect();
    cleaned
        .trim_start_matches(['-', '_'])
        .chars()
        .take(crate::template::MAX_NAME_LEN)
        .collect()
}
