//! Agent Memory - 세션 간 유지되는 사용자 컨텍스트
//!
//! ## 구성
//! ```text
//! ┌─────────────────────────────────────────┐
//! │               AgentMemory               │
//! ├─────────────────────────────────────────┤
//! │  preferences      (editor, shell, ...)  │
//! │  commands         (최근 100개)           │
//! │  outcomes         (성공/부분/실패 통계)    │
//! │  feedback         (사용자 평가 집계)       │
//! └─────────────────────────────────────────┘
//! ```
//!
//! 임베딩 기반 검색은 하지 않는다. 프롬프트 컨텍스트는 선호도와 최근 5개 명령뿐이다.

use crate::feedback::{Feedback, FeedbackTally};
use anvil_task::{Outcome, OutcomeStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// 기본 명령 기록 상한
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// 프롬프트에 넣는 최근 명령 수
pub const RECENT_CONTEXT: usize = 5;

/// 명령 기록 항목
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEntry {
    pub command: String,
    pub status: OutcomeStatus,
    pub exit_code: i32,
    pub at: DateTime<Utc>,
}

/// 결과 통계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeStats {
    pub success: u32,
    pub partial: u32,
    pub failure: u32,
}

impl OutcomeStats {
    pub fn total(&self) -> u32 {
        self.success + self.partial + self.failure
    }

    /// 성공률 (기록이 없으면 0)
    pub fn success_rate(&self) -> f32 {
        match self.total() {
            0 => 0.0,
            total => self.success as f32 / total as f32,
        }
    }
}

/// 에이전트 메모리
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMemory {
    #[serde(default)]
    pub preferences: BTreeMap<String, String>,

    #[serde(default)]
    commands: VecDeque<CommandEntry>,

    #[serde(default)]
    pub outcomes: OutcomeStats,

    #[serde(default)]
    pub feedback: FeedbackTally,

    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

impl Default for AgentMemory {
    fn default() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl AgentMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            preferences: BTreeMap::new(),
            commands: VecDeque::new(),
            outcomes: OutcomeStats::default(),
            feedback: FeedbackTally::default(),
            limit: limit.max(1),
        }
    }

    // ========================================================================
    // 기록
    // ========================================================================

    /// 실행된 명령과 결과 기록
    pub fn record_command(&mut self, command: &str, outcome: &Outcome, exit_code: i32) {
        if self.commands.len() >= self.limit {
            self.commands.pop_front();
        }
        self.commands.push_back(CommandEntry {
            command: command.to_string(),
            status: outcome.status,
            exit_code,
            at: Utc::now(),
        });

        match outcome.status {
            OutcomeStatus::Success => self.outcomes.success += 1,
            OutcomeStatus::Partial => self.outcomes.partial += 1,
            OutcomeStatus::Failure | OutcomeStatus::NeedsRetry => self.outcomes.failure += 1,
        }

        self.learn_preferences(command);
    }

    pub fn record_feedback(&mut self, feedback: Feedback, comment: Option<&str>) {
        self.feedback.record(feedback, comment);
    }

    pub fn set_preference(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.preferences.insert(key.into(), value.into());
    }

    /// 명령에서 편집기/셸 선호도 추출
    fn learn_preferences(&mut self, command: &str) {
        let verb = command.split_whitespace().next().unwrap_or_default();
        if let Some(editor) = ["vim", "vi", "nvim", "nano", "emacs"]
            .iter()
            .find(|e| **e == verb)
        {
            self.set_preference("preferred_editor", *editor);
        }
        if let Some(shell) = ["bash", "zsh", "fish"]
            .iter()
            .find(|s| command.split_whitespace().any(|w| w == **s))
        {
            self.set_preference("preferred_shell", *shell);
        }
        if command.split_whitespace().any(|w| w == "-v" || w == "--verbose") {
            self.set_preference("verbose_output", "true");
        }
    }

    // ========================================================================
    // 조회
    // ========================================================================

    pub fn commands(&self) -> impl Iterator<Item = &CommandEntry> {
        self.commands.iter()
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    /// 최근 `n`개 명령 (오래된 것부터)
    pub fn recent(&self, n: usize) -> Vec<&CommandEntry> {
        let skip = self.commands.len().saturating_sub(n);
        self.commands.iter().skip(skip).collect()
    }

    /// 시스템 프롬프트에 붙일 메모리 컨텍스트
    pub fn context(&self) -> String {
        let mut parts = Vec::new();

        if !self.preferences.is_empty() {
            let prefs: Vec<String> = self
                .preferences
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v))
                .collect();
            parts.push(format!("User preferences:\n{}", prefs.join("\n")));
        }

        let recent = self.recent(RECENT_CONTEXT);
        if !recent.is_empty() {
            let lines: Vec<String> = recent
                .iter()
                .map(|c| format!("- {} ({})", c.command, c.status))
                .collect();
            parts.push(format!("Recent commands:\n{}", lines.join("\n")));
        }

        if let Some(feedback) = self.feedback.context() {
            parts.push(feedback);
        }

        parts.join("\n\n")
    }

    /// `stats` 메타 명령 출력
    pub fn stats_report(&self) -> String {
        format!(
            "commands: {} recorded ({} success, {} partial, {} failure, {:.0}% success rate)\nfeedback: {} positive, {} negative, {} neutral",
            self.commands.len(),
            self.outcomes.success,
            self.outcomes.partial,
            self.outcomes.failure,
            self.outcomes.success_rate() * 100.0,
            self.feedback.positive,
            self.feedback.negative,
            self.feedback.neutral,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(status: OutcomeStatus) -> Outcome {
        Outcome {
            status,
            summary: String::new(),
            should_retry: false,
            gap_hint: None,
            timed_out: false,
        }
    }

    #[test]
    fn test_history_is_bounded() {
        let mut memory = AgentMemory::with_limit(3);
        for i in 0..5 {
            memory.record_command(&format!("echo {}", i), &outcome(OutcomeStatus::Success), 0);
        }
        assert_eq!(memory.command_count(), 3);
        assert_eq!(memory.recent(1)[0].command, "echo 4");
        assert_eq!(memory.outcomes.success, 5);
    }

    #[test]
    fn test_context_lists_last_five() {
        let mut memory = AgentMemory::new();
        for i in 0..8 {
            memory.record_command(&format!("ls dir{}", i), &outcome(OutcomeStatus::Success), 0);
        }
        let context = memory.context();
        assert!(context.contains("ls dir7 (success)"));
        assert!(context.contains("ls dir3"));
        assert!(!context.contains("ls dir2"));
    }

    #[test]
    fn test_learns_preferences() {
        let mut memory = AgentMemory::new();
        memory.record_command("vim notes.txt", &outcome(OutcomeStatus::Success), 0);
        memory.record_command("bash -c 'ls'", &outcome(OutcomeStatus::Failure), 1);
        assert_eq!(memory.preferences.get("preferred_editor").map(String::as_str), Some("vim"));
        assert_eq!(memory.preferences.get("preferred_shell").map(String::as_str), Some("bash"));
        assert!((memory.outcomes.success_rate() - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_stats_report() {
        let mut memory = AgentMemory::new();
        memory.record_command("pwd", &outcome(OutcomeStatus::Success), 0);
        memory.record_feedback(Feedback::Positive, None);
        let report = memory.stats_report();
        assert!(report.contains("1 recorded"));
        assert!(report.contains("100% success rate"));
        assert!(report.contains("1 positive"));
    }
}
