//! CommandIntent - 턴 단위 요청 파싱

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use uuid::Uuid;

/// 요청 출처
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntentSource {
    /// 사용자가 직접 입력
    User,
    /// LLM이 제안한 명령
    Llm,
    /// 자기 확장으로 생성된 산출물
    SelfExtension,
}

impl IntentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentSource::User => "user",
            IntentSource::Llm => "llm",
            IntentSource::SelfExtension => "self-extension",
        }
    }
}

/// 파싱된 요청
///
/// 생성 이후 변경하지 않는다. 다른 출처로 재해석이 필요하면 새 intent를 만든다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandIntent {
    /// intent_ref로 사용되는 고유 ID
    pub id: Uuid,

    /// 원문
    pub raw_text: String,

    /// 첫 토큰 (소문자)
    pub parsed_verb: String,

    /// `key=value` / `--key=value`는 이름 그대로, 나머지는 `arg0..argN`
    pub parsed_arguments: BTreeMap<String, String>,

    /// 출처
    pub source: IntentSource,
}

impl CommandIntent {
    /// 텍스트를 파싱하여 intent 생성
    pub fn parse(text: &str, source: IntentSource) -> Self {
        let raw_text = text.trim().to_string();
        let tokens = tokenize(&raw_text);

        let parsed_verb = tokens
            .first()
            .map(|t| t.to_lowercase())
            .unwrap_or_default();

        let mut parsed_arguments = BTreeMap::new();
        let mut position = 0usize;
        for token in tokens.iter().skip(1) {
            if let Some((key, value)) = split_named(token) {
                parsed_arguments.insert(key.to_string(), value.to_string());
            } else {
                parsed_arguments.insert(format!("arg{}", position), token.clone());
                position += 1;
            }
        }

        Self {
            id: Uuid::new_v4(),
            raw_text,
            parsed_verb,
            parsed_arguments,
            source,
        }
    }

    /// 위치 인자 (입력 순서)
    pub fn positional(&self) -> Vec<&str> {
        let mut indexed: Vec<(usize, &str)> = self
            .parsed_arguments
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix("arg")
                    .and_then(|n| n.parse::<usize>().ok())
                    .map(|n| (n, v.as_str()))
            })
            .collect();
        indexed.sort_by_key(|(n, _)| *n);
        indexed.into_iter().map(|(_, v)| v).collect()
    }

    /// 경로처럼 보이는 위치 인자
    pub fn path_arguments(&self) -> Vec<&str> {
        self.positional()
            .into_iter()
            .filter(|a| looks_like_path(a))
            .collect()
    }

    /// 소문자 단어 목록 (verb 포함, 키워드 휴리스틱용)
    pub fn words(&self) -> Vec<String> {
        self.raw_text
            .split(|c: char| !c.is_alphanumeric() && c != '-' && c != '_')
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.parsed_verb.is_empty()
    }
}

fn split_named(token: &str) -> Option<(&str, &str)> {
    let stripped = token.strip_prefix("--").unwrap_or(token);
    let (key, value) = stripped.split_once('=')?;
    let valid_key = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    valid_key.then_some((key, value))
}

fn looks_like_path(arg: &str) -> bool {
    arg.starts_with('/')
        || arg.starts_with("./")
        || arg.starts_with("../")
        || arg.starts_with('~')
        || arg == "."
        || arg == ".."
        || (arg.contains('/') && !arg.contains("://"))
}

/// 셸 규칙으로 토큰화 (따옴표 불균형이면 공백 기준)
pub fn tokenize(text: &str) -> Vec<String> {
    shlex::split(text).unwrap_or_else(|| text.split_whitespace().map(String::from).collect())
}

// ============================================================================
// LLM 응답에서 명령 추출
// ============================================================================

fn fenced_block() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:bash|sh|shell|zsh|console)?[ \t]*\n(.*?)```").ok())
        .as_ref()
}

fn inline_code() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`([^`\n]+)`").ok()).as_ref()
}

/// LLM 응답에서 셸 명령 추출
///
/// 순서: ```bash 펜스 블록 → `$ ` 접두 라인 → 인라인 백틱
pub fn extract_command(reply: &str) -> Option<String> {
    if let Some(caps) = fenced_block().and_then(|re| re.captures(reply)) {
        let body: Vec<&str> = caps[1]
            .lines()
            .map(|l| l.trim())
            .map(|l| l.strip_prefix("$ ").unwrap_or(l))
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .collect();
        if !body.is_empty() {
            return Some(body.join("\n"));
        }
    }

    if let Some(line) = reply
        .lines()
        .map(|l| l.trim())
        .find_map(|l| l.strip_prefix("$ "))
    {
        let line = line.trim();
        if !line.is_empty() {
            return Some(line.to_string());
        }
    }

    inline_code()
        .and_then(|re| re.captures(reply))
        .map(|caps| caps[1].trim().to_string())
        .filter(|c| !c.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_positional_and_named() {
        let intent = CommandIntent::parse("LS -la --color=auto /data", IntentSource::User);
        assert_eq!(intent.parsed_verb, "ls");
        assert_eq!(intent.parsed_arguments.get("arg0").map(String::as_str), Some("-la"));
        assert_eq!(intent.parsed_arguments.get("color").map(String::as_str), Some("auto"));
        assert_eq!(intent.positional(), vec!["-la", "/data"]);
        assert_eq!(intent.path_arguments(), vec!["/data"]);
    }

    #[test]
    fn test_parse_unbalanced_quotes_falls_back() {
        let intent = CommandIntent::parse("echo \"hello world", IntentSource::Llm);
        assert_eq!(intent.parsed_verb, "echo");
        assert_eq!(intent.positional(), vec!["\"hello", "world"]);
        assert_eq!(intent.source, IntentSource::Llm);
    }

    #[test]
    fn test_positional_order_beyond_ten() {
        let text = (0..12).map(|i| i.to_string()).collect::<Vec<_>>().join(" ");
        let intent = CommandIntent::parse(&format!("echo {}", text), IntentSource::User);
        let positional = intent.positional();
        assert_eq!(positional.len(), 12);
        assert_eq!(positional[10], "10");
    }

    #[test]
    fn test_extract_command_from_fence() {
        let reply = "Try this:\n```bash\n$ ls -la\n```\nDone.";
        assert_eq!(extract_command(reply).as_deref(), Some("ls -la"));
    }

    #[test]
    fn test_extract_command_dollar_and_inline() {
        assert_eq!(
            extract_command("Run:\n$ df -h\n").as_deref(),
            Some("df -h")
        );
        assert_eq!(
            extract_command("You can use `du -sh .` for that").as_deref(),
            Some("du -sh .")
        );
        assert_eq!(extract_command("no command here"), None);
    }
}
