//! Local executor - runs approved commands on the host
//!
//! Features:
//! - 실행 직전 verdict 재확인 (fail-closed)
//! - stdout/stderr 각각 크기 상한 캡처 + 잘림 표식
//! - 하드 타임아웃: 프로세스 그룹 전체 종료, exit_code = `TIMEOUT_EXIT_CODE`
//! - 취소: 프로세스 그룹 종료 후 결과 폐기

use super::output::CappedBuffer;
use super::r#trait::Executor;
use super::request::ExecutionRequest;
use anvil_foundation::{
    Error, ExecutionResult, ExecutorSettings, PolicyValidator, Result, TIMEOUT_EXIT_CODE,
};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 프로세스 종료 후 출력 리더를 기다리는 시간
const READER_GRACE: Duration = Duration::from_secs(2);

/// Local executor configuration
#[derive(Debug, Clone)]
pub struct LocalExecutorConfig {
    /// 명령 타임아웃
    pub timeout: Duration,
    /// stdout/stderr 각각의 캡처 상한 (바이트)
    pub max_output_bytes: usize,
    /// 실행 셸 (`-c`로 명령 전달)
    pub shell: String,
}

impl Default for LocalExecutorConfig {
    fn default() -> Self {
        Self::from(&ExecutorSettings::default())
    }
}

impl From<&ExecutorSettings> for LocalExecutorConfig {
    fn from(settings: &ExecutorSettings) -> Self {
        Self {
            timeout: Duration::from_secs(settings.timeout_secs),
            max_output_bytes: settings.max_output_bytes,
            shell: settings.shell.clone(),
        }
    }
}

/// 호스트에서 직접 실행하는 executor
pub struct LocalExecutor {
    validator: Arc<PolicyValidator>,
    config: LocalExecutorConfig,
}

enum WaitOutcome {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

impl LocalExecutor {
    pub fn new(validator: Arc<PolicyValidator>) -> Self {
        Self::with_config(validator, LocalExecutorConfig::default())
    }

    pub fn with_config(validator: Arc<PolicyValidator>, config: LocalExecutorConfig) -> Self {
        Self { validator, config }
    }

    pub fn config(&self) -> &LocalExecutorConfig {
        &self.config
    }

    fn build_command(&self, request: &ExecutionRequest) -> Command {
        let (shell, shell_arg) = if cfg!(windows) {
            ("cmd", "/C")
        } else {
            (self.config.shell.as_str(), "-c")
        };

        let mut cmd = Command::new(shell);
        cmd.arg(shell_arg)
            .arg(&request.command)
            .current_dir(&request.context.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // 자식이 자기 프로세스 그룹의 리더가 되어 그룹 단위로 종료할 수 있다
        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        cmd
    }
}

/// 프로세스 트리 종료
async fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: killpg는 신호만 보낸다. pid는 process_group(0)으로 만든 그룹 ID.
            let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
            if rc != 0 {
                debug!("killpg({}) failed: {}", pid, std::io::Error::last_os_error());
            }
        }
    }
    let _ = child.kill().await;
}

/// 종료 코드 (시그널로 끝났으면 128 + 시그널 번호)
fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

/// 리더 태스크 결과 회수 (제한 시간 초과 시 빈 버퍼)
async fn collect(handle: JoinHandle<CappedBuffer>, cap: usize) -> (String, bool) {
    let abort = handle.abort_handle();
    match tokio::time::timeout(READER_GRACE, handle).await {
        Ok(Ok(buffer)) => buffer.into_text(),
        Ok(Err(_)) => CappedBuffer::new(cap).into_text(),
        Err(_) => {
            // 백그라운드 손자 프로세스가 파이프를 잡고 있는 경우
            abort.abort();
            CappedBuffer::new(cap).into_text()
        }
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    async fn execute(
        &self,
        request: &ExecutionRequest,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult> {
        request.authorize(&self.validator)?;

        if cancel.is_cancelled() {
            return Err(Error::Cancelled(request.command.clone()));
        }

        debug!("Executing intent {}: {}", request.intent.id, request.command);

        let started = Instant::now();
        let mut child = self
            .build_command(request)
            .spawn()
            .map_err(|e| Error::Internal(format!("Failed to spawn process: {}", e)))?;

        let cap = self.config.max_output_bytes;
        let stdout_task = child
            .stdout
            .take()
            .map(|out| tokio::spawn(CappedBuffer::new(cap).drain(out)));
        let stderr_task = child
            .stderr
            .take()
            .map(|err| tokio::spawn(CappedBuffer::new(cap).drain(err)));

        let outcome = tokio::select! {
            status = child.wait() => WaitOutcome::Exited(status),
            _ = tokio::time::sleep(self.config.timeout) => WaitOutcome::TimedOut,
            _ = cancel.cancelled() => WaitOutcome::Cancelled,
        };

        let (exit_code, timed_out) = match outcome {
            WaitOutcome::Exited(Ok(status)) => (exit_code_of(status), false),
            WaitOutcome::Exited(Err(e)) => {
                kill_tree(&mut child).await;
                return Err(Error::Internal(format!("Process error: {}", e)));
            }
            WaitOutcome::TimedOut => {
                warn!(
                    "Command timed out after {:.1}s, killing process group: {}",
                    self.config.timeout.as_secs_f64(),
                    request.command
                );
                kill_tree(&mut child).await;
                let _ = child.wait().await;
                (TIMEOUT_EXIT_CODE, true)
            }
            WaitOutcome::Cancelled => {
                info!("Execution cancelled: {}", request.command);
                kill_tree(&mut child).await;
                let _ = child.wait().await;
                for task in [stdout_task, stderr_task].into_iter().flatten() {
                    task.abort();
                }
                return Err(Error::Cancelled(request.command.clone()));
            }
        };

        let (stdout, stdout_truncated) = match stdout_task {
            Some(task) => collect(task, cap).await,
            None => (String::new(), false),
        };
        let (mut stderr, stderr_truncated) = match stderr_task {
            Some(task) => collect(task, cap).await,
            None => (String::new(), false),
        };

        if timed_out {
            if !stderr.is_empty() && !stderr.ends_with('\n') {
                stderr.push('\n');
            }
            stderr.push_str(&format!(
                "Command timed out after {} seconds",
                self.config.timeout.as_secs()
            ));
        }

        let duration = started.elapsed();
        debug!(
            "Command finished: exit_code={}, duration={:.2}s",
            exit_code,
            duration.as_secs_f64()
        );

        Ok(ExecutionResult {
            exit_code,
            stdout,
            stderr,
            duration,
            intent_ref: request.intent.id,
            command: request.command.clone(),
            timed_out,
            truncated: stdout_truncated || stderr_truncated,
        })
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
