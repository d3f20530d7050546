//! 타임아웃 시나리오: 상한을 넘긴 명령은 프로세스 트리 종료 + sentinel 종료 코드

#![cfg(unix)]

use anvil_foundation::{
    CommandIntent, IntentSource, PolicyContext, PolicyValidator, TIMEOUT_EXIT_CODE,
};
use anvil_task::{
    ExecutionRequest, Executor, LocalExecutor, LocalExecutorConfig, OutcomeAnalyzer,
    OutcomeStatus,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

fn executor(timeout: Duration) -> (LocalExecutor, Arc<PolicyValidator>) {
    let validator = Arc::new(PolicyValidator::new());
    let executor = LocalExecutor::with_config(
        validator.clone(),
        LocalExecutorConfig {
            timeout,
            max_output_bytes: 4096,
            shell: "sh".to_string(),
        },
    );
    (executor, validator)
}

fn request(validator: &PolicyValidator, root: &std::path::Path, command: &str) -> ExecutionRequest {
    let ctx = PolicyContext::for_command(root, &[], IntentSource::User);
    let verdict = validator.validate(command, &ctx);
    assert!(!verdict.is_denied(), "{}", verdict.summary());
    let confirmed = verdict.needs_confirmation();
    ExecutionRequest::new(CommandIntent::parse(command, IntentSource::User), command, ctx)
        .with_verdict(verdict)
        .confirmed(confirmed)
}

#[tokio::test]
async fn sleep_beyond_timeout_is_failure_without_retry() {
    let dir = tempfile::tempdir().unwrap();
    let (executor, validator) = executor(Duration::from_secs(1));
    let req = request(&validator, dir.path(), "sleep 60");

    let started = Instant::now();
    let result = executor.execute(&req, &CancellationToken::new()).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(15));
    assert_eq!(result.exit_code, TIMEOUT_EXIT_CODE);
    assert!(result.timed_out);

    let outcome = OutcomeAnalyzer::new().analyze(&result, &req.intent);
    assert_eq!(outcome.status, OutcomeStatus::Failure);
    assert!(!outcome.should_retry);
}

#[tokio::test]
async fn timeout_terminates_child_processes() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("survivor.txt");
    let (executor, validator) = executor(Duration::from_millis(500));

    // 자식 셸이 2초 뒤 파일을 만들려 한다. 그룹 종료가 되면 파일은 생기지 않는다.
    let command = "sh -c 'sleep 2; echo alive > survivor.txt' & wait";
    let req = request(&validator, dir.path(), command);

    let result = executor.execute(&req, &CancellationToken::new()).await.unwrap();
    assert!(result.timed_out);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!marker.exists());
}

#[tokio::test]
async fn command_not_found_reveals_gap() {
    let dir = tempfile::tempdir().unwrap();
    let (executor, validator) = executor(Duration::from_secs(5));
    let req = request(&validator, dir.path(), "anvil-nonexistent-tool --version");

    let result = executor.execute(&req, &CancellationToken::new()).await.unwrap();
    assert_eq!(result.exit_code, 127);

    let outcome = OutcomeAnalyzer::new().analyze(&result, &req.intent);
    assert!(outcome.should_retry);
    assert_eq!(outcome.gap_hint.as_deref(), Some("anvil-nonexistent-tool"));
}
