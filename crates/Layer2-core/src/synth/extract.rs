//! LLM 응답에서 JSON 본문 추출

use regex::Regex;
use std::sync::OnceLock;

fn fenced_json() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\n(.*?)```").ok())
        .as_ref()
}

/// 펜스 블록 중 `{`로 시작하는 첫 블록, 없으면 가장 바깥쪽 `{...}`
pub fn extract_json(reply: &str) -> Option<String> {
    if let Some(re) = fenced_json() {
        let fenced = re
            .captures_iter(reply)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .find(|body| body.starts_with('{'));
        if let Some(body) = fenced {
            return Some(body.to_string());
        }
    }

    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| reply[start..=end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_block() {
        let reply = "Here it is:\n```json\n{\"a\": 1}\n```\nEnjoy";
        assert_eq!(extract_json(reply).as_deref(), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_skips_non_json_fence() {
        let reply = "```bash\nls\n```\n```\n{\"b\": 2}\n```";
        assert_eq!(extract_json(reply).as_deref(), Some("{\"b\": 2}"));
    }

    #[test]
    fn test_outermost_braces() {
        let reply = "Sure! {\"a\": {\"b\": 1}} hope that helps";
        assert_eq!(extract_json(reply).as_deref(), Some("{\"a\": {\"b\": 1}}"));
    }

    #[test]
    fn test_no_json() {
        assert_eq!(extract_json("I cannot do that"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }
}
