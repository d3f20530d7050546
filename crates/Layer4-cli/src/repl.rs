//! Interactive session

use crate::cli::run_turn;
use crate::confirm::{StdinConfirmer, StdinInput};
use anvil_agent::{Feedback, Orchestrator};
use anvil_foundation::{Error, Result};
use std::io::Write;
use std::sync::Arc;
use tracing::warn;

const HELP: &str = "\
Type a request or a shell command. Anvil validates it, runs it and adds
missing capabilities on its own.

Meta commands:
  feedback positive|negative|neutral [comment]   rate the last answer
  helpful / unhelpful                            shorthand feedback
  stats                                          show command and feedback stats
  help                                           show this help
  exit / quit                                    leave the session

Ctrl-C cancels the running command.";

/// REPL 메타 명령 (파이프라인으로 보내지 않음)
#[derive(Debug, Clone, PartialEq)]
pub enum MetaCommand {
    Exit,
    Help,
    Stats,
    Feedback {
        feedback: Feedback,
        comment: Option<String>,
    },
}

/// 메타 명령이면 Some (인자가 잘못됐으면 Some(Err))
pub fn parse_meta(line: &str) -> Option<Result<MetaCommand>> {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    let meta = match head.to_lowercase().as_str() {
        "exit" | "quit" if rest.is_empty() => MetaCommand::Exit,
        "help" if rest.is_empty() => MetaCommand::Help,
        "stats" if rest.is_empty() => MetaCommand::Stats,
        "helpful" => MetaCommand::Feedback {
            feedback: Feedback::Positive,
            comment: non_empty(rest),
        },
        "unhelpful" => MetaCommand::Feedback {
            feedback: Feedback::Negative,
            comment: non_empty(rest),
        },
        "feedback" => {
            let (kind, comment) = match rest.split_once(char::is_whitespace) {
                Some((kind, comment)) => (kind, comment.trim()),
                None => (rest, ""),
            };
            if kind.is_empty() {
                return Some(Err(Error::InvalidInput(
                    "usage: feedback positive|negative|neutral [comment]".to_string(),
                )));
            }
            return Some(kind.parse().map(|feedback| MetaCommand::Feedback {
                feedback,
                comment: non_empty(comment),
            }));
        }
        _ => return None,
    };
    Some(Ok(meta))
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Run the interactive loop until `exit`, EOF or Ctrl-C at the prompt
pub async fn run(agent: Orchestrator) -> anyhow::Result<()> {
    let input = StdinInput::new();
    let mut agent = agent.with_confirmer(Arc::new(StdinConfirmer::with_input(input.clone())));

    eprintln!(
        "Anvil {} - working in {}. Type 'help' for commands, 'exit' to quit.",
        env!("CARGO_PKG_VERSION"),
        agent.config().working_dir.display()
    );

    loop {
        eprint!("anvil> ");
        let _ = std::io::stderr().flush();

        let line = tokio::select! {
            line = input.read_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                eprintln!();
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_meta(line) {
            Some(Ok(MetaCommand::Exit)) => break,
            Some(Ok(MetaCommand::Help)) => println!("{}", HELP),
            Some(Ok(MetaCommand::Stats)) => println!("{}", agent.memory().stats_report()),
            Some(Ok(MetaCommand::Feedback { feedback, comment })) => {
                agent.record_feedback(feedback, comment.as_deref());
                if let Err(e) = agent.save() {
                    warn!("Failed to save feedback: {}", e);
                }
                eprintln!("Recorded {} feedback.", feedback);
            }
            Some(Err(e)) => eprintln!("error: {}", e.reason()),
            None => {
                run_turn(&mut agent, line).await;
            }
        }
    }

    if let Err(e) = agent.save() {
        eprintln!("warning: session state was not saved: {}", e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_and_help() {
        assert_eq!(parse_meta("exit").unwrap().unwrap(), MetaCommand::Exit);
        assert_eq!(parse_meta("  QUIT ").unwrap().unwrap(), MetaCommand::Exit);
        assert_eq!(parse_meta("help").unwrap().unwrap(), MetaCommand::Help);
        assert_eq!(parse_meta("stats").unwrap().unwrap(), MetaCommand::Stats);
    }

    #[test]
    fn test_feedback_with_comment() {
        let meta = parse_meta("feedback negative too slow to answer").unwrap().unwrap();
        assert_eq!(
            meta,
            MetaCommand::Feedback {
                feedback: Feedback::Negative,
                comment: Some("too slow to answer".to_string()),
            }
        );
        let meta = parse_meta("helpful").unwrap().unwrap();
        assert_eq!(
            meta,
            MetaCommand::Feedback {
                feedback: Feedback::Positive,
                comment: None,
            }
        );
    }

    #[test]
    fn test_bad_feedback_is_error() {
        assert!(parse_meta("feedback").unwrap().is_err());
        assert!(parse_meta("feedback amazing").unwrap().is_err());
    }

    #[test]
    fn test_requests_are_not_meta() {
        assert!(parse_meta("list files in data").is_none());
        assert!(parse_meta("help me find large files").is_none());
        assert!(parse_meta("exit 1").is_none());
    }
}
