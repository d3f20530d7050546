//! Artifact Synthesizer - gap을 템플릿에 맞는 산출물로 생성
//!
//! ```text
//! CapabilityGap ──► 프롬프트 스캐폴드 ──► LLM ──► JSON 추출 ──► 구조 검사
//!                                            ▲                     │ 실패
//!                                            └── 교정 프롬프트 (1회) ◄┘
//! ```
//!
//! LLM 장애(네트워크, 타임아웃, rate limit)는 `LlmUnavailable`,
//! 응답 구조 문제는 `SynthesisSchemaError`로 구분한다.

mod extract;
mod prompt;

pub use extract::extract_json;
pub use prompt::{corrective_prompt, synthesis_prompt, SYNTHESIS_SYSTEM_PROMPT};

use crate::gap::CapabilityGap;
use crate::template::{spec_for, ArtifactManifest, TemplateSpec};
use anvil_foundation::{CapabilityKind, Error, Result};
use anvil_provider::{CompletionOptions, LlmClient};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 합성 시 LLM 호출 기본 타임아웃
pub const DEFAULT_SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(120);

/// 최초 시도 + 교정 1회
const MAX_ATTEMPTS: u32 = 2;

// ============================================================================
// Artifact
// ============================================================================

/// 산출물 메타데이터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub name: String,
    pub description: String,
    pub keywords: Vec<String>,
    /// LLM 호출 횟수 (1 또는 2)
    pub attempts: u32,
    /// gap 신뢰도
    pub confidence: f32,
    pub model: String,
    pub generated_at: DateTime<Utc>,
    pub request_text: String,
    pub intent_ref: Uuid,
}

/// 합성된 산출물 - 검증 전까지 Integration Manager가 단독 소유
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub kind: CapabilityKind,
    pub template_id: String,
    /// 저장될 매니페스트 JSON
    pub generated_source: String,
    /// 호출 문법
    pub declared_interface: String,
    pub metadata: ArtifactMetadata,
    pub manifest: ArtifactManifest,
}

impl Artifact {
    /// 매니페스트로부터 산출물 구성
    pub fn from_manifest(
        manifest: ArtifactManifest,
        template_id: impl Into<String>,
        metadata: ArtifactMetadata,
    ) -> Result<Self> {
        Ok(Self {
            kind: manifest.kind(),
            template_id: template_id.into(),
            generated_source: manifest.to_json()?,
            declared_interface: manifest.invocation_grammar(),
            metadata,
            manifest,
        })
    }

    pub fn name(&self) -> &str {
        self.manifest.name()
    }
}

// ============================================================================
// Synthesizer
// ============================================================================

/// 산출물 합성기
pub struct Synthesizer {
    llm: Arc<dyn LlmClient>,
    timeout: Duration,
    temperature: f32,
}

impl Synthesizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            timeout: DEFAULT_SYNTHESIS_TIMEOUT,
            temperature: 0.2,
        }
    }

    /// LLM 호출 타임아웃 (실행 타임아웃과 별개)
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// gap을 산출물로 합성 (구조 오류 시 교정 프롬프트로 한 번만 재시도)
    pub async fn synthesize(&self, gap: &CapabilityGap, cancel: &CancellationToken) -> Result<Artifact> {
        let spec = spec_for(gap.missing_kind).ok_or_else(|| {
            Error::SynthesisSchemaError(format!("no template for kind '{}'", gap.missing_kind))
        })?;

        info!("Synthesizing {} '{}' ({})", gap.missing_kind, gap.suggested_name, spec.id);

        let mut prompt = synthesis_prompt(gap, spec);
        let mut last_problem = String::new();

        for attempt in 1..=MAX_ATTEMPTS {
            let reply = self.complete(&prompt, cancel).await?;

            match self.coerce(gap, spec, &reply) {
                Ok(manifest) => {
                    let metadata = ArtifactMetadata {
                        name: manifest.name().to_string(),
                        description: manifest.description().to_string(),
                        keywords: manifest.keywords(),
                        attempts: attempt,
                        confidence: gap.confidence,
                        model: self.llm.model().to_string(),
                        generated_at: Utc::now(),
                        request_text: gap.request_text.clone(),
                        intent_ref: gap.requested_intent_ref,
                    };
                    let artifact = Artifact::from_manifest(manifest, spec.id, metadata)?;
                    info!(
                        "Synthesized {} '{}' after {} attempt(s)",
                        artifact.kind,
                        artifact.name(),
                        attempt
                    );
                    return Ok(artifact);
                }
                Err(Error::SynthesisSchemaError(problem)) => {
                    warn!("Synthesis attempt {} rejected: {}", attempt, problem);
                    prompt = corrective_prompt(spec, &reply, &problem);
                    last_problem = problem;
                }
                Err(other) => return Err(other),
            }
        }

        Err(Error::SynthesisSchemaError(format!(
            "{} could not be produced after {} attempts: {}",
            spec.id, MAX_ATTEMPTS, last_problem
        )))
    }

    /// 응답을 템플릿 구조로 변환 (이름은 gap의 제안 이름으로 고정)
    fn coerce(&self, gap: &CapabilityGap, spec: &TemplateSpec, reply: &str) -> Result<ArtifactManifest> {
        let json = extract_json(reply).ok_or_else(|| {
            Error::SynthesisSchemaError("response contains no JSON object".to_string())
        })?;
        let mut value: Value = serde_json::from_str(&json)
            .map_err(|e| Error::SynthesisSchemaError(format!("response is not valid JSON: {}", e)))?;

        if let Some(object) = value.as_object_mut() {
            if object.get("name").and_then(Value::as_str) != Some(gap.suggested_name.as_str()) {
                debug!("Coercing manifest name to '{}'", gap.suggested_name);
                object.insert("name".to_string(), Value::String(gap.suggested_name.clone()));
            }
        }

        ArtifactManifest::from_value(spec.kind, value)
    }

    async fn complete(&self, prompt: &str, cancel: &CancellationToken) -> Result<String> {
        let options = CompletionOptions::default()
            .with_system(SYNTHESIS_SYSTEM_PROMPT)
            .with_temperature(self.temperature);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled("synthesis".to_string())),
            result = tokio::time::timeout(self.timeout, self.llm.complete_with(prompt, &[], &options)) => {
                match result {
                    Err(_) => Err(Error::LlmUnavailable(format!(
                        "{} did not answer within {}s",
                        self.llm.name(),
                        self.timeout.as_secs()
                    ))),
                    Ok(reply) => Ok(reply?),
                }
            }
        }
    }
}
