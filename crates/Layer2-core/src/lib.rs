//! anvil-core: Capability Registry와 Self-Extension 엔진
//!
//! Layer2 - 능력 관리 레이어
//!
//! # 주요 모듈
//!
//! - `registry`: 사용 가능한 capability의 단일 진실 공급원 (CapabilityRegistry)
//! - `gap`: 요청을 기존 capability로 처리할 수 있는지 판단 (GapDetector)
//! - `template`: 종류별 고정 템플릿과 매니페스트 (command/plugin/template/environment)
//! - `synth`: LLM으로 템플릿에 맞는 산출물 합성 (Synthesizer)
//! - `integration`: 산출물 검증 및 원자적 등록 (IntegrationManager)
//!
//! # 사용 예시
//!
//! ```ignore
//! use anvil_core::{CapabilityRegistry, GapDetector, IntegrateOptions, IntegrationManager, Synthesizer};
//!
//! let registry = Arc::new(CapabilityRegistry::with_builtins());
//! let detector = GapDetector::new(registry.clone());
//!
//! if let Some(gap) = detector.detect(&intent) {
//!     let artifact = Synthesizer::new(llm).synthesize(&gap, &cancel).await?;
//!     let record = manager.integrate(artifact, IntegrateOptions::default())?;
//! }
//! ```

pub mod gap;
pub mod integration;
pub mod registry;
pub mod synth;
pub mod template;

// Re-exports: Registry
pub use registry::{builtin_capabilities, CapabilityRegistry, RegistrySnapshot};

// Re-exports: Gap
pub use gap::{CapabilityGap, GapDetector, GapTrigger, Resolution};

// Re-exports: Template
pub use template::{
    catalog, spec_by_id, spec_for, ArtifactManifest, CommandManifest, ContextTemplateManifest,
    EnvironmentManifest, PluginAction, PluginManifest, TemplateSpec,
};

// Re-exports: Synth
pub use synth::{Artifact, ArtifactMetadata, Synthesizer, DEFAULT_SYNTHESIS_TIMEOUT};

// Re-exports: Integration
pub use integration::{ArtifactWriter, ExtensionLayout, FsWriter, IntegrateOptions, IntegrationManager};
