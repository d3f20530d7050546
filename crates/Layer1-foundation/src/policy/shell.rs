//! 셸 텍스트 분해 - 세그먼트, verb, 경로 후보 추출

use crate::types::tokenize;
use regex::Regex;
use std::sync::OnceLock;

/// 따옴표 밖의 `;`, `&&`, `||`, `|`, `&`, 개행 기준으로 분리
///
/// `2>&1`, `&>` 같은 리다이렉션의 `&`는 구분자로 보지 않는다.
pub fn split_segments(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if !in_single => {
                current.push(c);
                escaped = true;
            }
            '\'' if !in_double => {
                in_single = !in_single;
                current.push(c);
            }
            '"' if !in_single => {
                in_double = !in_double;
                current.push(c);
            }
            '&' if !in_single && !in_double => {
                let redirect = current.ends_with('>')
                    || current.ends_with('<')
                    || chars.peek() == Some(&'>');
                if redirect {
                    current.push(c);
                } else {
                    push_segment(&mut segments, &mut current);
                }
            }
            ';' | '|' | '\n' if !in_single && !in_double => {
                push_segment(&mut segments, &mut current);
            }
            _ => current.push(c),
        }
    }
    push_segment(&mut segments, &mut current);
    segments
}

fn push_segment(segments: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        segments.push(trimmed.to_string());
    }
    current.clear();
}

/// 실제 실행 verb와 인자 (환경변수 대입, nohup/time/exec 접두어 건너뜀)
pub(crate) fn verb_and_args(segment: &str) -> (Option<String>, Vec<String>) {
    let tokens = tokenize(segment);
    let mut iter = tokens.into_iter().peekable();

    while let Some(token) = iter.peek() {
        let is_assignment = token
            .split_once('=')
            .map(|(k, _)| !k.is_empty() && k.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(false);
        let is_wrapper = matches!(token.as_str(), "nohup" | "time" | "exec" | "command" | "builtin");
        if is_assignment || is_wrapper {
            iter.next();
        } else {
            break;
        }
    }

    let verb = iter.next().map(|v| {
        v.rsplit('/')
            .next()
            .unwrap_or(v.as_str())
            .to_lowercase()
    });
    (verb, iter.collect())
}

fn redirect_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?:^|[^<>&=\-0-9])(?:[0-9]|&)?>{1,2}\|?\s*["']?([^\s;&|<>"'()]+)"#).ok()
    })
    .as_ref()
}

fn code_write_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?:\bopen\(\s*\\?["']([^"'\\]+)\\?["']\s*,\s*\\?["'][wax]|\b(?:fs::write|writeFileSync|write_file)\(\s*\\?["']([^"'\\]+))"#,
        )
        .ok()
    })
    .as_ref()
}

/// 텍스트에서 쓰기 대상 경로 추출 (정규화 전 원문)
pub fn write_targets(text: &str) -> Vec<String> {
    let mut targets = Vec::new();

    if let Some(re) = redirect_re() {
        for caps in re.captures_iter(text) {
            targets.push(caps[1].to_string());
        }
    }
    if let Some(re) = code_write_re() {
        for caps in re.captures_iter(text) {
            if let Some(m) = caps.get(1).or_else(|| caps.get(2)) {
                targets.push(m.as_str().to_string());
            }
        }
    }

    for segment in split_segments(text) {
        let (verb, args) = verb_and_args(&segment);
        let Some(verb) = verb else { continue };
        let operands: Vec<&String> = args
            .iter()
            .filter(|a| !a.starts_with('-') && !a.contains('>') && !a.contains('<'))
            .collect();

        match verb.as_str() {
            "tee" | "touch" | "mkdir" | "rm" | "rmdir" | "truncate" | "shred" | "unlink" => {
                targets.extend(operands.iter().map(|a| a.to_string()));
            }
            "chmod" | "chown" | "chgrp" => {
                targets.extend(operands.iter().skip(1).map(|a| a.to_string()));
            }
            "cp" | "mv" | "install" | "ln" | "rsync" => {
                if operands.len() >= 2 {
                    if let Some(last) = operands.last() {
                        targets.push(last.to_string());
                    }
                }
            }
            "sed" if args.iter().any(|a| a.starts_with("-i")) => {
                if let Some(last) = operands.last() {
                    targets.push(last.to_string());
                }
            }
            "dd" => {
                targets.extend(
                    args.iter()
                        .filter_map(|a| a.strip_prefix("of="))
                        .map(String::from),
                );
            }
            _ => {}
        }
    }

    // `{args}` 같은 manifest 자리표시자는 경로가 아니다 (`${VAR}`는 남긴다)
    targets.retain(|t| !t.is_empty() && !t.starts_with('{'));
    targets.dedup();
    targets
}

/// 셸 변수나 명령 치환이 들어 있어 실행 전에는 알 수 없는 경로
pub(crate) fn is_unresolved(path: &str) -> bool {
    path.contains('$') || path.contains('`')
}

/// `..` 구성 요소가 있는지
pub(crate) fn has_parent_component(path: &str) -> bool {
    path.split('/').any(|part| part == "..")
}

/// 경로처럼 보이는 인자 (읽기 경로 후보, 미해석 경로 포함)
pub(crate) fn path_like_arguments(args: &[String]) -> Vec<String> {
    args.iter()
        .filter(|a| !a.starts_with('-') && !a.contains("://"))
        .filter(|a| {
            a.starts_with('/')
                || a.starts_with('~')
                || a.starts_with("./")
                || has_parent_component(a)
                || (is_unresolved(a) && a.contains('/') && !a.contains(char::is_whitespace))
        })
        .cloned()
        .collect()
}
