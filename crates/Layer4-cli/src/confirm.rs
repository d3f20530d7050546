//! 터미널 확인 프롬프트

use anvil_agent::{ConfirmPurpose, ConfirmRequest, Confirmer};
use async_trait::async_trait;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

/// REPL과 확인 프롬프트가 함께 쓰는 stdin 줄 리더
pub struct StdinInput {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl StdinInput {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        })
    }

    /// 한 줄 (EOF면 None)
    pub async fn read_line(&self) -> std::io::Result<Option<String>> {
        self.lines.lock().await.next_line().await
    }
}

/// stdin으로 y/N을 묻는 confirmer
pub struct StdinConfirmer {
    input: Arc<StdinInput>,
}

impl StdinConfirmer {
    pub fn new() -> Self {
        Self::with_input(StdinInput::new())
    }

    pub fn with_input(input: Arc<StdinInput>) -> Self {
        Self { input }
    }
}

#[async_trait]
impl Confirmer for StdinConfirmer {
    async fn confirm(&self, request: &ConfirmRequest) -> bool {
        let action = match request.purpose {
            ConfirmPurpose::Execute => "Run",
            ConfirmPurpose::Integrate => "Install capability",
        };
        eprintln!("{}: {}", action, request.subject);
        eprintln!("  {}", request.verdict.summary());
        if let Some(safer) = &request.safer_variant {
            eprintln!("  safer alternative: {}", safer);
        }
        eprint!("Proceed? [y/N] ");
        let _ = std::io::stderr().flush();

        match self.input.read_line().await {
            Ok(Some(answer)) => is_yes(&answer),
            _ => false,
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answers() {
        assert!(is_yes("y"));
        assert!(is_yes(" YES \n"));
        assert!(!is_yes(""));
        assert!(!is_yes("no"));
        assert!(!is_yes("yep"));
    }
}
