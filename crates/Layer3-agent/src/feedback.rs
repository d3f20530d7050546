//! User feedback - REPL에서 받은 평가 집계
//!
//! ```text
//! "helpful" / "feedback positive ..." ──► Feedback::Positive ──► FeedbackTally
//! ```
//!
//! 집계는 다음 턴의 시스템 프롬프트 컨텍스트로 쓰인다.

use anvil_foundation::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 피드백 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Positive,
    Negative,
    Neutral,
}

impl Feedback {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feedback::Positive => "positive",
            Feedback::Negative => "negative",
            Feedback::Neutral => "neutral",
        }
    }
}

impl FromStr for Feedback {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" | "good" | "+" | "helpful" => Ok(Feedback::Positive),
            "negative" | "bad" | "-" | "unhelpful" => Ok(Feedback::Negative),
            "neutral" | "ok" => Ok(Feedback::Neutral),
            other => Err(Error::InvalidInput(format!(
                "unknown feedback '{}' (expected positive, negative or neutral)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Feedback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 피드백 집계
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackTally {
    pub positive: u32,
    pub negative: u32,
    pub neutral: u32,

    /// 마지막 코멘트
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_comment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_at: Option<DateTime<Utc>>,
}

impl FeedbackTally {
    pub fn record(&mut self, feedback: Feedback, comment: Option<&str>) {
        match feedback {
            Feedback::Positive => self.positive += 1,
            Feedback::Negative => self.negative += 1,
            Feedback::Neutral => self.neutral += 1,
        }
        if let Some(comment) = comment.map(str::trim).filter(|c| !c.is_empty()) {
            self.last_comment = Some(comment.to_string());
        }
        self.last_at = Some(Utc::now());
    }

    pub fn total(&self) -> u32 {
        self.positive + self.negative + self.neutral
    }

    /// 프롬프트용 요약 (피드백이 없으면 None)
    pub fn context(&self) -> Option<String> {
        if self.total() == 0 {
            return None;
        }
        let mut text = format!(
            "User feedback so far: {} positive, {} negative, {} neutral.",
            self.positive, self.negative, self.neutral
        );
        if self.negative > self.positive {
            text.push_str(" Recent answers were not helpful; be more careful and explain commands.");
        }
        if let Some(comment) = &self.last_comment {
            text.push_str(&format!(" Last comment: \"{}\"", comment));
        }
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("Positive".parse::<Feedback>().unwrap(), Feedback::Positive);
        assert_eq!("unhelpful".parse::<Feedback>().unwrap(), Feedback::Negative);
        assert!("great".parse::<Feedback>().is_err());
    }

    #[test]
    fn test_tally() {
        let mut tally = FeedbackTally::default();
        assert!(tally.context().is_none());

        tally.record(Feedback::Negative, Some("too verbose"));
        tally.record(Feedback::Neutral, Some("  "));

        assert_eq!(tally.total(), 2);
        assert_eq!(tally.last_comment.as_deref(), Some("too verbose"));
        let context = tally.context().unwrap();
        assert!(context.contains("1 negative"));
        assert!(context.contains("not helpful"));
    }
}
