//! Non-interactive mode and turn rendering

use crate::confirm::StdinConfirmer;
use anvil_agent::{AgentEvent, Orchestrator, TurnReport};
use anvil_foundation::ErrorKind;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Run a single request in non-interactive mode
pub async fn run_once(agent: Orchestrator, prompt: &str) -> anyhow::Result<()> {
    let mut agent = agent.with_confirmer(Arc::new(StdinConfirmer::new()));
    let report = run_turn(&mut agent, prompt).await;

    if let Some(error) = &report.error {
        if error.kind != ErrorKind::Cancelled {
            std::process::exit(1);
        }
    }
    Ok(())
}

/// 한 턴 실행: Ctrl-C로 취소, 이벤트와 결과 출력
pub async fn run_turn(agent: &mut Orchestrator, input: &str) -> TurnReport {
    let (tx, mut rx) = mpsc::unbounded_channel();
    // 이벤트 채널은 턴마다 새로 연결 (턴이 끝나면 닫혀서 printer 종료)
    agent.set_events(Some(tx));

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(&event);
        }
    });

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n^C cancelling...");
                cancel.cancel();
            }
        })
    };

    let report = agent.handle_turn(input, &cancel).await;
    watcher.abort();

    agent.set_events(None);
    let _ = printer.await;

    print_report(&report);
    report
}

fn print_event(event: &AgentEvent) {
    match event {
        AgentEvent::Output {
            stdout, stderr, ..
        } => {
            if !stdout.is_empty() {
                print!("{}", ensure_newline(stdout));
            }
            if !stderr.is_empty() {
                eprint!("{}", ensure_newline(stderr));
            }
        }
        AgentEvent::Verdict { subject, verdict } if !verdict.is_allowed() => {
            eprintln!("[policy] {}: {}", subject, verdict.summary());
        }
        AgentEvent::Extended(record) => {
            eprintln!("[extend] {} '{}' -> {}", record.kind, record.name, record.status);
        }
        _ => {}
    }
}

/// 턴 결과 요약 출력
pub fn print_report(report: &TurnReport) {
    for line in render_report(report) {
        eprintln!("{}", line);
    }
    if let Some(reply) = &report.reply {
        println!("{}", reply.trim_end());
    }
}

/// 출력할 요약 줄 (명령 출력과 답변 제외)
pub fn render_report(report: &TurnReport) -> Vec<String> {
    let mut lines = Vec::new();

    for notice in &report.notices {
        lines.push(format!("note: {}", notice));
    }

    if let (Some(command), Some(outcome)) = (&report.command, &report.outcome) {
        let attempts = if report.attempts > 1 {
            format!(" after {} attempts", report.attempts)
        } else {
            String::new()
        };
        lines.push(format!("[{}] {}{}", outcome.status, command, attempts));
    }

    if let Some(error) = &report.error {
        lines.push(format!("error: {}", error));
    }

    if let Some(suggestion) = &report.suggestion {
        lines.push(format!(
            "suggestion ({}): {}",
            suggestion.verdict.outcome, suggestion.command
        ));
    }

    lines
}

fn ensure_newline(text: &str) -> String {
    if text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{}\n", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_foundation::{Error, IntentSource};
    use anvil_task::{Outcome, OutcomeStatus};

    fn report() -> TurnReport {
        TurnReport {
            input: "ls".to_string(),
            command: None,
            source: None,
            verdict: None,
            result: None,
            outcome: None,
            extension: None,
            reply: None,
            suggestion: None,
            notices: Vec::new(),
            error: None,
            attempts: 0,
        }
    }

    #[test]
    fn test_render_outcome_and_error() {
        let mut report = report();
        report.command = Some("sleep 60".to_string());
        report.source = Some(IntentSource::User);
        report.attempts = 1;
        report.outcome = Some(Outcome {
            status: OutcomeStatus::Failure,
            summary: "Command timed out: sleep 60".to_string(),
            should_retry: false,
            gap_hint: None,
            timed_out: true,
        });
        report.error = Some(Error::timeout("sleep 60", 30).to_report());
        report.notices.push("LLM unavailable".to_string());

        let lines = render_report(&report);
        assert_eq!(lines[0], "note: LLM unavailable");
        assert_eq!(lines[1], "[failure] sleep 60");
        assert!(lines[2].starts_with("error: ExecutionTimeout"));
    }

    #[test]
    fn test_empty_report_renders_nothing() {
        assert!(render_report(&report()).is_empty());
    }
}
