//! Outcome Analyzer - 실행 결과 분류
//!
//! ```text
//! timed_out                             → failure (should_retry = false)
//! exit 0, 경고 패턴 없음                  → success
//! exit 0, 경고 패턴 있음                  → partial
//! exit != 0, missing capability 패턴     → failure (should_retry = true, gap_hint)
//! exit != 0, 일시적 장애 패턴             → needs-retry
//! exit != 0, 그 외                       → failure (should_retry = false)
//! ```

use anvil_foundation::{CommandIntent, ExecutionResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::debug;

/// 셸이 명령을 찾지 못했을 때의 종료 코드
pub const COMMAND_NOT_FOUND_EXIT_CODE: i32 = 127;

const SUMMARY_PREVIEW_CHARS: usize = 200;

/// 분류 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeStatus {
    Success,
    Partial,
    Failure,
    /// 일시적 장애 - 같은 명령을 한 번 더 실행해볼 만함
    NeedsRetry,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Success => "success",
            OutcomeStatus::Partial => "partial",
            OutcomeStatus::Failure => "failure",
            OutcomeStatus::NeedsRetry => "needs-retry",
        }
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 분석 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub status: OutcomeStatus,

    /// 사람이 읽을 한 줄 요약
    pub summary: String,

    /// Gap Detector로 다시 보낼지 (missing capability)
    pub should_retry: bool,

    /// 없는 것으로 보이는 명령 이름
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap_hint: Option<String>,

    /// 타임아웃으로 끝났는지
    #[serde(default)]
    pub timed_out: bool,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, OutcomeStatus::Failure | OutcomeStatus::NeedsRetry)
    }

    /// missing capability로 판단된 실패
    pub fn reveals_gap(&self) -> bool {
        self.should_retry && self.gap_hint.is_some()
    }
}

fn not_found_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // sh: 1: foo: not found / bash: foo: command not found
            r"(?m)^(?:[\w/.-]+:\s+)?(?:line\s+)?(?:\d+:\s+)?([\w.+-]+):\s+(?:command\s+)?not found\s*$",
            // zsh: command not found: foo
            r"(?m)command not found:\s*([\w.+-]+)",
            // env: 'foo': No such file or directory
            r"(?m)^(?:/usr/bin/)?env:\s+'?([\w.+-]+)'?:\s+No such file or directory",
            // Unknown command: foo / unknown subcommand 'foo'
            r"(?mi)unknown (?:sub)?command:?\s+'?([\w.+-]+)'?",
            r"(?mi)is not recognized as an internal or external command",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

const WARNING_MARKERS: &[&str] = &["warning", "deprecated", "caution"];

const TRANSIENT_MARKERS: &[&str] = &[
    "resource temporarily unavailable",
    "could not get lock",
    "connection reset",
    "temporary failure in name resolution",
    "text file busy",
];

/// 실행 결과 분류기 (상태 없음)
#[derive(Debug, Clone, Default)]
pub struct OutcomeAnalyzer;

impl OutcomeAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// 결과 분류
    pub fn analyze(&self, result: &ExecutionResult, intent: &CommandIntent) -> Outcome {
        let outcome = self.classify(result, intent);
        debug!(
            "Outcome for '{}': {} (should_retry={}, gap_hint={:?})",
            result.command, outcome.status, outcome.should_retry, outcome.gap_hint
        );
        outcome
    }

    fn classify(&self, result: &ExecutionResult, intent: &CommandIntent) -> Outcome {
        if result.timed_out {
            return Outcome {
                status: OutcomeStatus::Failure,
                summary: format!("Command timed out: {}", result.command),
                should_retry: false,
                gap_hint: None,
                timed_out: true,
            };
        }

        let stderr_lower = result.stderr.to_lowercase();

        if result.exit_code == 0 {
            let warned = WARNING_MARKERS.iter().any(|m| stderr_lower.contains(m));
            let (status, label) = if warned {
                (OutcomeStatus::Partial, "Completed with warnings")
            } else {
                (OutcomeStatus::Success, "Completed successfully")
            };
            return Outcome {
                status,
                summary: summarize(label, result),
                should_retry: false,
                gap_hint: None,
                timed_out: false,
            };
        }

        if let Some(missing) = self.missing_command(result, intent) {
            return Outcome {
                status: OutcomeStatus::Failure,
                summary: format!("Command not available: {}", missing),
                should_retry: true,
                gap_hint: Some(missing),
                timed_out: false,
            };
        }

        if TRANSIENT_MARKERS.iter().any(|m| stderr_lower.contains(m)) {
            return Outcome {
                status: OutcomeStatus::NeedsRetry,
                summary: summarize("Transient failure", result),
                should_retry: false,
                gap_hint: None,
                timed_out: false,
            };
        }

        Outcome {
            status: OutcomeStatus::Failure,
            summary: summarize(&format!("Exited with code {}", result.exit_code), result),
            should_retry: false,
            gap_hint: None,
            timed_out: false,
        }
    }

    /// command-not-found 패턴에서 빠진 명령 이름 추출
    fn missing_command(&self, result: &ExecutionResult, intent: &CommandIntent) -> Option<String> {
        let matched = not_found_patterns().iter().find_map(|re| {
            re.captures(&result.stderr).map(|caps| {
                caps.get(1)
                    .map(|m| m.as_str().to_lowercase())
                    .unwrap_or_default()
            })
        });

        let fallback_verb = || {
            (!intent.parsed_verb.is_empty()).then(|| intent.parsed_verb.clone())
        };

        match matched {
            Some(name) if !name.is_empty() => Some(name),
            Some(_) => fallback_verb(),
            None if result.exit_code == COMMAND_NOT_FOUND_EXIT_CODE => fallback_verb(),
            None => None,
        }
    }
}

fn summarize(label: &str, result: &ExecutionResult) -> String {
    let source = if result.exit_code == 0 {
        &result.stdout
    } else if result.stderr.trim().is_empty() {
        &result.stdout
    } else {
        &result.stderr
    };

    let first_line = source.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    if first_line.is_empty() {
        return label.to_string();
    }

    let preview: String = first_line.chars().take(SUMMARY_PREVIEW_CHARS).collect();
    format!("{}: {}", label, preview.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_foundation::{IntentSource, TIMEOUT_EXIT_CODE};
    use std::time::Duration;

    fn result(command: &str, exit_code: i32, stdout: &str, stderr: &str) -> (ExecutionResult, CommandIntent) {
        let intent = CommandIntent::parse(command, IntentSource::User);
        let result = ExecutionResult {
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            duration: Duration::from_millis(5),
            intent_ref: intent.id,
            command: command.to_string(),
            timed_out: exit_code == TIMEOUT_EXIT_CODE,
            truncated: false,
        };
        (result, intent)
    }

    #[test]
    fn test_success() {
        let (r, i) = result("ls", 0, "a.txt\nb.txt", "");
        let outcome = OutcomeAnalyzer::new().analyze(&r, &i);
        assert_eq!(outcome.status, OutcomeStatus::Success);
        assert!(!outcome.should_retry);
        assert_eq!(outcome.summary, "Completed successfully: a.txt");
    }

    #[test]
    fn test_warning_is_partial() {
        let (r, i) = result("npm ls", 0, "tree", "npm WARN deprecated request@2.88.2");
        assert_eq!(OutcomeAnalyzer::new().analyze(&r, &i).status, OutcomeStatus::Partial);
    }

    #[test]
    fn test_command_not_found() {
        let (r, i) = result("kubectl get pods", 127, "", "sh: 1: kubectl: not found");
        let outcome = OutcomeAnalyzer::new().analyze(&r, &i);
        assert_eq!(outcome.status, OutcomeStatus::Failure);
        assert!(outcome.should_retry);
        assert_eq!(outcome.gap_hint.as_deref(), Some("kubectl"));
        assert!(outcome.reveals_gap());
    }

    #[test]
    fn test_bash_and_zsh_not_found() {
        let analyzer = OutcomeAnalyzer::new();
        let (r, i) = result("dockr ps", 127, "", "bash: dockr: command not found");
        assert_eq!(analyzer.analyze(&r, &i).gap_hint.as_deref(), Some("dockr"));

        let (r, i) = result("helm list", 127, "", "zsh: command not found: helm");
        assert_eq!(analyzer.analyze(&r, &i).gap_hint.as_deref(), Some("helm"));
    }

    #[test]
    fn test_exit_127_without_pattern_uses_verb() {
        let (r, i) = result("terraform plan", 127, "", "");
        assert_eq!(
            OutcomeAnalyzer::new().analyze(&r, &i).gap_hint.as_deref(),
            Some("terraform")
        );
    }

    #[test]
    fn test_missing_file_is_plain_failure() {
        let (r, i) = result("cat nope.txt", 1, "", "cat: nope.txt: No such file or directory");
        let outcome = OutcomeAnalyzer::new().analyze(&r, &i);
        assert_eq!(outcome.status, OutcomeStatus::Failure);
        assert!(!outcome.should_retry);
        assert!(outcome.gap_hint.is_none());
    }

    #[test]
    fn test_transient_failure() {
        let (r, i) = result(
            "apt-get install jq",
            100,
            "",
            "E: Could not get lock /var/lib/dpkg/lock-frontend",
        );
        assert_eq!(
            OutcomeAnalyzer::new().analyze(&r, &i).status,
            OutcomeStatus::NeedsRetry
        );
    }

    #[test]
    fn test_timeout_never_retries() {
        let (r, i) = result("sleep 60", TIMEOUT_EXIT_CODE, "", "Command timed out after 30 seconds");
        let outcome = OutcomeAnalyzer::new().analyze(&r, &i);
        assert_eq!(outcome.status, OutcomeStatus::Failure);
        assert!(!outcome.should_retry);
        assert!(outcome.timed_out);
    }
}
