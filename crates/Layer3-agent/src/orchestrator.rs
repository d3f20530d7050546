//! Orchestrator - 한 턴의 파이프라인을 구동하는 상태 기계
//!
//! ```text
//! AwaitingIntent ──► Validating ──► Executing ──► Analyzing ──► AwaitingIntent
//!        │                ▲                           │
//!        ▼                │                           │ missing capability
//! ExtendingCapability ────┘ ◄─────────────────────────┘ (턴당 1회)
//!   DetectingGap → Synthesizing → Integrating
//! ```
//!
//! 모든 파이프라인 에러는 `TurnReport.error`로 보고되고 턴은 `AwaitingIntent`로 돌아간다.
//! 세션 상태(대화 기록, registry, 메모리)는 이 구조체가 소유하며 전역 상태는 없다.

use crate::confirm::{AutoDecline, ConfirmPurpose, ConfirmRequest, Confirmer};
use crate::event::AgentEvent;
use crate::feedback::Feedback;
use crate::history::ConversationHistory;
use crate::memory::AgentMemory;
use crate::prompt::{command_request_prompt, error_analysis_prompt, system_prompt};
use crate::session::{SessionState, SessionStore};
use crate::state::{AgentState, ExtensionPhase};
use anvil_core::{
    ArtifactWriter, CapabilityGap, CapabilityRegistry, ExtensionLayout, GapDetector,
    IntegrateOptions, IntegrationManager, Synthesizer, DEFAULT_SYNTHESIS_TIMEOUT,
};
use anvil_foundation::{
    extract_command, AgentConfig, CapabilityRecord, CapabilityStatus, CommandIntent, Error,
    ErrorKind, ErrorReport, ExecutionResult, IntentSource, PolicyContext, PolicyValidator,
    PolicyVerdict, Result,
};
use anvil_provider::{CompletionOptions, LlmClient};
use anvil_task::{
    ExecutionRequest, Executor, LocalExecutor, LocalExecutorConfig, Outcome, OutcomeAnalyzer,
    OutcomeStatus,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// LLM에 넘기는 최근 대화 메시지 수
const DEFAULT_HISTORY_WINDOW: usize = 20;

/// NeedsRetry 결과의 최대 실행 횟수
const MAX_TRANSIENT_ATTEMPTS: u32 = 2;

// ============================================================================
// Config
// ============================================================================

/// Orchestrator 설정 (시작 시 한 번 만들어지고 바뀌지 않음)
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// 작업 루트 (명령 실행 디렉토리)
    pub working_dir: PathBuf,

    pub layout: ExtensionLayout,

    /// 명령이 쓸 수 있는 루트 (확장 디렉토리 + 데이터)
    pub writable_roots: Vec<PathBuf>,

    pub self_extension: bool,

    /// 실패 후 LLM 분석
    pub llm_analysis: bool,

    /// 명령 제안/분석용 LLM 호출 타임아웃
    pub llm_timeout: Duration,

    /// 확장 산출물 합성 타임아웃 (명령 제안보다 긴 응답)
    pub synthesis_timeout: Duration,

    pub history_window: usize,

    pub memory_limit: usize,
}

impl OrchestratorConfig {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        let working_dir = working_dir.into();
        let layout = ExtensionLayout::under(&working_dir);
        let mut writable_roots = layout.roots();
        writable_roots.push(working_dir.join("data"));
        Self {
            working_dir,
            layout,
            writable_roots,
            self_extension: true,
            llm_analysis: true,
            llm_timeout: Duration::from_secs(120),
            synthesis_timeout: DEFAULT_SYNTHESIS_TIMEOUT,
            history_window: DEFAULT_HISTORY_WINDOW,
            memory_limit: crate::memory::DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn from_agent_config(config: &AgentConfig) -> Self {
        Self {
            working_dir: config.paths.working_dir.clone(),
            layout: ExtensionLayout::from_paths(&config.paths),
            writable_roots: config.paths.command_writable_roots(),
            self_extension: config.agent.self_extension,
            llm_analysis: config.agent.llm_analysis,
            llm_timeout: Duration::from_secs(config.llm.timeout_secs),
            synthesis_timeout: Duration::from_secs(config.agent.synthesis_timeout_secs),
            history_window: DEFAULT_HISTORY_WINDOW,
            memory_limit: config.agent.history_limit,
        }
    }

    pub fn with_self_extension(mut self, enabled: bool) -> Self {
        self.self_extension = enabled;
        self
    }

    pub fn with_llm_analysis(mut self, enabled: bool) -> Self {
        self.llm_analysis = enabled;
        self
    }

    pub fn with_llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    pub fn with_synthesis_timeout(mut self, timeout: Duration) -> Self {
        self.synthesis_timeout = timeout;
        self
    }
}

// ============================================================================
// Turn report
// ============================================================================

/// 실행하지 않은 LLM 후속 제안
#[derive(Debug, Clone)]
pub struct Suggestion {
    pub command: String,
    pub verdict: PolicyVerdict,
    pub explanation: String,
}

/// 한 턴의 결과
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub input: String,

    /// 마지막으로 검증된 명령
    pub command: Option<String>,
    pub source: Option<IntentSource>,
    pub verdict: Option<PolicyVerdict>,

    pub result: Option<ExecutionResult>,
    pub outcome: Option<Outcome>,

    /// 이번 턴에 통합(또는 거부)된 capability
    pub extension: Option<CapabilityRecord>,

    /// 명령 없이 끝난 LLM 답변
    pub reply: Option<String>,

    pub suggestion: Option<Suggestion>,

    /// degraded mode 등 안내
    pub notices: Vec<String>,

    pub error: Option<ErrorReport>,

    /// 실행 횟수 (재시도 포함)
    pub attempts: u32,
}

impl TurnReport {
    fn new(input: &str) -> Self {
        Self {
            input: input.to_string(),
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

    /// 에러 없이 끝났고, 실행했다면 성공(또는 부분 성공)
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
            && self
                .outcome
                .as_ref()
                .map_or(true, |o| matches!(o.status, OutcomeStatus::Success | OutcomeStatus::Partial))
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}

/// 실행할 구체 명령과 그 출처
#[derive(Debug, Clone)]
struct Plan {
    command: String,
    source: IntentSource,
}

impl Plan {
    fn user(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            source: IntentSource::User,
        }
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct Orchestrator {
    config: OrchestratorConfig,
    validator: Arc<PolicyValidator>,
    registry: Arc<CapabilityRegistry>,
    detector: GapDetector,
    executor: Arc<dyn Executor>,
    analyzer: OutcomeAnalyzer,
    synthesizer: Synthesizer,
    integration: IntegrationManager,
    llm: Arc<dyn LlmClient>,
    confirmer: Arc<dyn Confirmer>,
    events: Option<mpsc::UnboundedSender<AgentEvent>>,
    store: Option<SessionStore>,
    history: ConversationHistory,
    memory: AgentMemory,
    state: AgentState,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        llm: Arc<dyn LlmClient>,
        executor: Arc<dyn Executor>,
        validator: Arc<PolicyValidator>,
    ) -> Self {
        let registry = Arc::new(CapabilityRegistry::with_builtins());
        let detector = GapDetector::new(registry.clone());
        let synthesizer = Synthesizer::new(llm.clone()).with_timeout(config.synthesis_timeout);
        let integration = IntegrationManager::new(
            registry.clone(),
            validator.clone(),
            config.layout.clone(),
            config.working_dir.clone(),
        );
        let memory = AgentMemory::with_limit(config.memory_limit);

        Self {
            config,
            validator,
            registry,
            detector,
            executor,
            analyzer: OutcomeAnalyzer::new(),
            synthesizer,
            integration,
            llm,
            confirmer: Arc::new(AutoDecline),
            events: None,
            store: None,
            history: ConversationHistory::new(),
            memory,
            state: AgentState::AwaitingIntent,
        }
    }

    /// 설정 파일 기반 구성 (정책 규칙 + 로컬 executor)
    pub fn from_config(config: &AgentConfig, llm: Arc<dyn LlmClient>) -> Result<Self> {
        let validator = Arc::new(PolicyValidator::from_settings(&config.policy)?);
        let executor = Arc::new(LocalExecutor::with_config(
            validator.clone(),
            LocalExecutorConfig::from(&config.executor),
        ));
        let orchestrator = Self::new(
            OrchestratorConfig::from_agent_config(config),
            llm,
            executor,
            validator,
        )
        .with_session_store(SessionStore::new(config.paths.state()));
        Ok(orchestrator)
    }

    pub fn with_confirmer(mut self, confirmer: Arc<dyn Confirmer>) -> Self {
        self.confirmer = confirmer;
        self
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<AgentEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// 이벤트 채널 교체 (None이면 끊음)
    pub fn set_events(&mut self, events: Option<mpsc::UnboundedSender<AgentEvent>>) {
        self.events = events;
    }

    pub fn with_session_store(mut self, store: SessionStore) -> Self {
        self.store = Some(store);
        self
    }

    /// 확장 파일 연산 교체 (장애 주입 테스트용)
    pub fn with_artifact_writer(mut self, writer: Arc<dyn ArtifactWriter>) -> Self {
        self.integration = self.integration.with_writer(writer);
        self
    }

    /// PATH 조회 없이 gap 판정 (셸 builtin만 passthrough)
    pub fn without_path_lookup(mut self) -> Self {
        self.detector = self.detector.without_path_lookup();
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    pub fn validator(&self) -> &Arc<PolicyValidator> {
        &self.validator
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn memory(&self) -> &AgentMemory {
        &self.memory
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn record_feedback(&mut self, feedback: Feedback, comment: Option<&str>) {
        self.memory.record_feedback(feedback, comment);
    }

    /// 명령 검증 컨텍스트
    pub fn command_context(&self, source: IntentSource) -> PolicyContext {
        PolicyContext::for_command(&self.config.working_dir, &self.config.writable_roots, source)
    }

    /// 실행 없이 명령 판정
    pub fn check(&self, command: &str) -> PolicyVerdict {
        self.validator
            .validate(command, &self.command_context(IntentSource::User))
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    pub fn session_state(&self) -> SessionState {
        SessionState::new(
            self.history.clone(),
            self.registry.snapshot(),
            self.memory.clone(),
        )
    }

    /// 저장된 상태 적용
    ///
    /// builtin은 항상 다시 채우고, 파일이 사라진 확장 레코드는 정리한다.
    pub fn restore(&mut self, state: SessionState) -> Vec<String> {
        self.registry.restore_with_builtins(&state.registry);
        self.history = state.history;
        self.memory = state.memory;

        let removed = self.integration.reconcile();
        info!(
            "Restored session ({} messages, {} capabilities, {} stale removed)",
            self.history.len(),
            self.registry.len(),
            removed.len()
        );
        removed
    }

    /// 세션 저장소에서 상태 로드 (저장소나 파일이 없으면 false)
    pub fn load(&mut self) -> Result<bool> {
        let Some(store) = &self.store else {
            return Ok(false);
        };
        match store.load()? {
            Some(state) => {
                self.restore(state);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn save(&self) -> Result<()> {
        match &self.store {
            Some(store) => store.save(&self.session_state()),
            None => Ok(()),
        }
    }

    // ========================================================================
    // Turn
    // ========================================================================

    /// 사용자 입력 한 건 처리
    ///
    /// 파이프라인 에러는 반환하지 않고 report에 담는다.
    pub async fn handle_turn(&mut self, text: &str, cancel: &CancellationToken) -> TurnReport {
        let mut report = TurnReport::new(text);
        let intent = CommandIntent::parse(text, IntentSource::User);

        if intent.is_empty() {
            report.error = Some(Error::InvalidInput("empty request".to_string()).to_report());
            return report;
        }

        self.history.add_user(text);

        let mut llm_down = false;
        if let Err(e) = self.run_turn(&intent, &mut report, &mut llm_down, cancel).await {
            match e.kind() {
                ErrorKind::Cancelled => info!("Turn cancelled: {}", e.reason()),
                ErrorKind::PolicyDenied => warn!("Turn blocked by policy: {}", e.reason()),
                _ => warn!("Turn failed: {}", e),
            }
            report.error = Some(e.to_report());
        }

        self.transition(AgentState::AwaitingIntent);

        if let Err(e) = self.save() {
            warn!("Failed to save session state: {}", e);
            self.notice(&mut report, format!("session state was not saved: {}", e.reason()));
        }

        self.emit(AgentEvent::TurnFinished {
            success: report.succeeded(),
        });
        report
    }

    async fn run_turn(
        &mut self,
        intent: &CommandIntent,
        report: &mut TurnReport,
        llm_down: &mut bool,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let Some(mut plan) = self.plan(intent, report, llm_down, cancel).await? else {
            return Ok(());
        };

        let mut reactive_used = false;
        loop {
            let (result, outcome) = self.execute_plan(&plan, intent, report, cancel).await?;

            if outcome.reveals_gap()
                && !reactive_used
                && self.config.self_extension
                && !*llm_down
            {
                reactive_used = true;
                if let Some(next) = self
                    .extend_reactive(&plan, &outcome, report, llm_down, cancel)
                    .await?
                {
                    plan = next;
                    continue;
                }
            }

            if outcome.is_failure() && self.config.llm_analysis && !*llm_down {
                self.suggest(&plan, &result, report, llm_down, cancel).await?;
            }
            return Ok(());
        }
    }

    /// intent → 실행할 명령
    ///
    /// 순서: registry 해석 → passthrough → 근거 있는 gap의 자기 확장 → LLM 제안.
    /// None이면 실행할 명령 없이 턴이 끝난다 (LLM이 설명만 답함).
    async fn plan(
        &mut self,
        intent: &CommandIntent,
        report: &mut TurnReport,
        llm_down: &mut bool,
        cancel: &CancellationToken,
    ) -> Result<Option<Plan>> {
        if let Some(resolution) = self.detector.resolve(intent)? {
            debug!(
                "Using {} '{}' for '{}'",
                resolution.record.kind, resolution.record.name, intent.raw_text
            );
            return Ok(Some(Plan::user(resolution.command)));
        }

        self.transition(AgentState::ExtendingCapability(ExtensionPhase::DetectingGap));
        let Some(gap) = self.detector.detect(intent) else {
            return Ok(Some(Plan::user(intent.raw_text.clone())));
        };

        if gap.has_evidence() && self.config.self_extension {
            match self.extend(&gap, intent, report, cancel).await {
                Ok(command) => return Ok(Some(Plan::user(command))),
                Err(Error::LlmUnavailable(reason)) => {
                    *llm_down = true;
                    self.notice(
                        report,
                        format!(
                            "LLM unavailable ({}); running the request directly without self-extension",
                            reason
                        ),
                    );
                    return Ok(Some(Plan::user(intent.raw_text.clone())));
                }
                Err(e) => return Err(e),
            }
        }

        self.propose(intent, report, llm_down, cancel).await
    }

    /// 근거 없는 gap: LLM에 명령 제안 요청
    async fn propose(
        &mut self,
        intent: &CommandIntent,
        report: &mut TurnReport,
        llm_down: &mut bool,
        cancel: &CancellationToken,
    ) -> Result<Option<Plan>> {
        let prompt = command_request_prompt(&intent.raw_text);
        match self.ask_llm(&prompt, cancel).await {
            Ok(reply) => {
                self.history.add_assistant(&reply);
                match extract_command(&reply) {
                    Some(command) => Ok(Some(Plan {
                        command,
                        source: IntentSource::Llm,
                    })),
                    None => {
                        report.reply = Some(reply);
                        Ok(None)
                    }
                }
            }
            Err(Error::LlmUnavailable(reason)) => {
                *llm_down = true;
                self.notice(
                    report,
                    format!("LLM unavailable ({}); running the request as typed", reason),
                );
                Ok(Some(Plan::user(intent.raw_text.clone())))
            }
            Err(e) => Err(e),
        }
    }

    // ========================================================================
    // Self-extension
    // ========================================================================

    /// gap → 합성 → 통합 → 새 capability로 intent 해석
    async fn extend(
        &mut self,
        gap: &CapabilityGap,
        intent: &CommandIntent,
        report: &mut TurnReport,
        cancel: &CancellationToken,
    ) -> Result<String> {
        info!("Extending capabilities: {}", gap.summary());

        self.transition(AgentState::ExtendingCapability(ExtensionPhase::Synthesizing));
        let artifact = self.synthesizer.synthesize(gap, cancel).await?;

        self.transition(AgentState::ExtendingCapability(ExtensionPhase::Integrating));
        let review = self.integration.review(&artifact)?;
        self.emit(AgentEvent::Verdict {
            subject: artifact.name().to_string(),
            verdict: review.clone(),
        });

        let mut options = IntegrateOptions::default();
        if review.needs_confirmation() {
            let request = ConfirmRequest {
                purpose: ConfirmPurpose::Integrate,
                subject: artifact.name().to_string(),
                verdict: review,
                safer_variant: None,
            };
            if self.confirmer.confirm(&request).await {
                options = options.confirmed();
            }
        }

        let record = self.integration.integrate(artifact, options)?;
        report.extension = Some(record.clone());
        self.emit(AgentEvent::Extended(record.clone()));

        if record.status == CapabilityStatus::Rejected {
            let reason = record
                .rejection_reason
                .clone()
                .unwrap_or_else(|| "rejected by policy".to_string());
            return Err(Error::IntegrationRejected(format!("{}: {}", record.name, reason)));
        }

        self.notice(
            report,
            format!("added {} '{}' (v{})", record.kind, record.name, record.version),
        );
        self.detector.render(&record, intent)
    }

    /// 실행 후 드러난 gap (command-not-found)
    async fn extend_reactive(
        &mut self,
        plan: &Plan,
        outcome: &Outcome,
        report: &mut TurnReport,
        llm_down: &mut bool,
        cancel: &CancellationToken,
    ) -> Result<Option<Plan>> {
        let Some(missing) = outcome.gap_hint.as_deref() else {
            return Ok(None);
        };
        let executed = CommandIntent::parse(&plan.command, plan.source);
        let Some(gap) = self.detector.detect_reactive(&executed, missing) else {
            return Ok(None);
        };

        match self.extend(&gap, &executed, report, cancel).await {
            Ok(command) => Ok(Some(Plan::user(command))),
            Err(e) if e.kind() == ErrorKind::Cancelled => Err(e),
            Err(e) => {
                if e.kind() == ErrorKind::LlmUnavailable {
                    *llm_down = true;
                }
                self.notice(report, format!("self-extension for '{}' failed: {}", missing, e.to_report()));
                report.error = Some(e.to_report());
                Ok(None)
            }
        }
    }

    // ========================================================================
    // Execution
    // ========================================================================

    async fn execute_plan(
        &mut self,
        plan: &Plan,
        intent: &CommandIntent,
        report: &mut TurnReport,
        cancel: &CancellationToken,
    ) -> Result<(ExecutionResult, Outcome)> {
        self.transition(AgentState::Validating);
        let ctx = self.command_context(plan.source);
        let verdict = self.validator.validate(&plan.command, &ctx);
        self.emit(AgentEvent::Verdict {
            subject: plan.command.clone(),
            verdict: verdict.clone(),
        });

        report.command = Some(plan.command.clone());
        report.source = Some(plan.source);
        report.verdict = Some(verdict.clone());

        let verdict = verdict.into_result()?;
        let confirmed = if verdict.needs_confirmation() {
            let sanitized = PolicyValidator::sanitize(&plan.command);
            let request = ConfirmRequest {
                purpose: ConfirmPurpose::Execute,
                subject: plan.command.clone(),
                verdict: verdict.clone(),
                safer_variant: (sanitized != plan.command).then_some(sanitized),
            };
            if !self.confirmer.confirm(&request).await {
                return Err(Error::policy_denied(
                    verdict.matched_rule.as_deref(),
                    format!("not confirmed: {}", verdict.reason),
                ));
            }
            true
        } else {
            false
        };

        let request = ExecutionRequest::new(intent.clone(), plan.command.clone(), ctx)
            .with_verdict(verdict)
            .confirmed(confirmed);
        // 분석은 실제로 실행된 명령 기준 (missing verb 추정)
        let executed = CommandIntent::parse(&plan.command, plan.source);

        let mut attempts = 0;
        loop {
            attempts += 1;
            report.attempts += 1;

            self.transition(AgentState::Executing);
            let result = self.executor.execute(&request, cancel).await?;

            self.transition(AgentState::Analyzing);
            let outcome = self.analyzer.analyze(&result, &executed);
            self.emit(AgentEvent::Output {
                command: result.command.clone(),
                stdout: result.stdout.clone(),
                stderr: result.stderr.clone(),
                exit_code: result.exit_code,
            });

            if outcome.status == OutcomeStatus::NeedsRetry && attempts < MAX_TRANSIENT_ATTEMPTS {
                info!("Transient failure for '{}', running once more", plan.command);
                continue;
            }

            self.history.add_tool(&plan.command, &result.combined_output());
            self.memory
                .record_command(&plan.command, &outcome, result.exit_code);

            if result.timed_out {
                report.error =
                    Some(Error::timeout(&plan.command, result.duration.as_secs()).to_report());
            }
            report.result = Some(result.clone());
            report.outcome = Some(outcome.clone());
            return Ok((result, outcome));
        }
    }

    /// 실패 후 LLM 분석 (제안만 하고 실행하지 않음)
    async fn suggest(
        &mut self,
        plan: &Plan,
        result: &ExecutionResult,
        report: &mut TurnReport,
        llm_down: &mut bool,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let prompt = error_analysis_prompt(&plan.command, result.exit_code, &result.combined_output());
        let reply = match self.ask_llm(&prompt, cancel).await {
            Ok(reply) => reply,
            Err(e) if e.kind() == ErrorKind::Cancelled => return Err(e),
            Err(e) => {
                *llm_down = true;
                debug!("Skipping failure analysis: {}", e);
                return Ok(());
            }
        };
        self.history.add_assistant(&reply);

        if let Some(command) = extract_command(&reply) {
            let verdict = self
                .validator
                .validate(&command, &self.command_context(IntentSource::Llm));
            self.emit(AgentEvent::Notice(format!("suggested: {}", command)));
            report.suggestion = Some(Suggestion {
                command,
                verdict,
                explanation: reply,
            });
        } else {
            report.reply = Some(reply);
        }
        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn ask_llm(&self, prompt: &str, cancel: &CancellationToken) -> Result<String> {
        let system = system_prompt(
            &self.config.working_dir,
            &self.registry.active(),
            &self.memory.context(),
        );
        let options = CompletionOptions::default().with_system(system);
        let history = self.history.recent(self.config.history_window);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled("llm request".to_string())),
            _ = tokio::time::sleep(self.config.llm_timeout) => Err(Error::LlmUnavailable(format!(
                "{} gave no reply within {}s",
                self.llm.name(),
                self.config.llm_timeout.as_secs()
            ))),
            reply = self.llm.complete_with(prompt, history, &options) => reply.map_err(Error::from),
        }
    }

    fn transition(&mut self, to: AgentState) {
        if self.state == to {
            return;
        }
        let from = std::mem::replace(&mut self.state, to);
        debug!("State: {} -> {}", from, to);
        self.emit(AgentEvent::StateChanged { from, to });
    }

    fn notice(&self, report: &mut TurnReport, message: String) {
        info!("{}", message);
        self.emit(AgentEvent::Notice(message.clone()));
        report.notices.push(message);
    }

    fn emit(&self, event: AgentEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_provider::ScriptedClient;

    fn orchestrator(dir: &std::path::Path, llm: ScriptedClient) -> Orchestrator {
        let validator = Arc::new(PolicyValidator::new());
        let executor = Arc::new(LocalExecutor::new(validator.clone()));
        Orchestrator::new(OrchestratorConfig::new(dir), Arc::new(llm), executor, validator)
            .without_path_lookup()
    }

    #[tokio::test]
    async fn test_empty_input_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let mut agent = orchestrator(dir.path(), ScriptedClient::new());

        let report = agent.handle_turn("   ", &CancellationToken::new()).await;
        assert_eq!(report.error_kind(), Some(ErrorKind::InvalidInput));
        assert!(agent.history().is_empty());
    }

    #[tokio::test]
    async fn test_llm_answer_without_command() {
        let dir = tempfile::tempdir().unwrap();
        let llm = ScriptedClient::new().with_reply("Recursion is a function calling itself.");
        let mut agent = orchestrator(dir.path(), llm);

        let report = agent
            .handle_turn("what is recursion", &CancellationToken::new())
            .await;
        assert!(report.error.is_none());
        assert!(report.command.is_none());
        assert_eq!(
            report.reply.as_deref(),
            Some("Recursion is a function calling itself.")
        );
        assert_eq!(agent.state(), AgentState::AwaitingIntent);
        assert_eq!(agent.history().len(), 2);
    }

    #[tokio::test]
    async fn test_events_trace_state_machine() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut agent = orchestrator(dir.path(), ScriptedClient::new()).with_events(tx);

        let report = agent.handle_turn("pwd", &CancellationToken::new()).await;
        assert!(report.succeeded(), "{:?}", report.error);

        let mut states = Vec::new();
        let mut finished = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                AgentEvent::StateChanged { to, .. } => states.push(to),
                AgentEvent::TurnFinished { success } => finished = success,
                _ => {}
            }
        }
        assert_eq!(
            states,
            vec![
                AgentState::Validating,
                AgentState::Executing,
                AgentState::Analyzing,
                AgentState::AwaitingIntent
            ]
        );
        assert!(finished);
    }

    #[tokio::test]
    async fn test_llm_proposal_is_llm_sourced() {
        let dir = tempfile::tempdir().unwrap();
        let llm = ScriptedClient::new().with_reply("```bash\necho hello\n```\nPrints hello.");
        let mut agent = orchestrator(dir.path(), llm);

        let report = agent.handle_turn("say hello please", &CancellationToken::new()).await;
        assert_eq!(report.source, Some(IntentSource::Llm));
        assert_eq!(report.command.as_deref(), Some("echo hello"));
        assert!(report.succeeded(), "{:?}", report.error);
        assert_eq!(report.result.unwrap().stdout.trim(), "hello");
    }

    #[test]
    fn test_synthesis_timeout_is_separate_from_llm_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let agent = orchestrator(dir.path(), ScriptedClient::new());
        assert_eq!(agent.synthesizer.timeout(), DEFAULT_SYNTHESIS_TIMEOUT);

        let mut config = AgentConfig::default();
        config.paths.working_dir = dir.path().to_path_buf();
        config.llm.timeout_secs = 15;
        config.agent.synthesis_timeout_secs = 300;
        let mapped = OrchestratorConfig::from_agent_config(&config);
        assert_eq!(mapped.llm_timeout, Duration::from_secs(15));
        assert_eq!(mapped.synthesis_timeout, Duration::from_secs(300));

        let validator = Arc::new(PolicyValidator::new());
        let executor = Arc::new(LocalExecutor::new(validator.clone()));
        let agent = Orchestrator::new(
            OrchestratorConfig::new(dir.path())
                .with_llm_timeout(Duration::from_secs(1))
                .with_synthesis_timeout(Duration::from_secs(90)),
            Arc::new(ScriptedClient::new()),
            executor,
            validator,
        );
        assert_eq!(agent.synthesizer.timeout(), Duration::from_secs(90));
    }
}
