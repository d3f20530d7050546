//! # anvil-foundation
//!
//! Foundation layer for Anvil:
//! - Types: 파이프라인 공용 데이터 모델 (CommandIntent, CapabilityRecord, ExecutionResult)
//! - Policy: 명령/산출물 보안 게이트 (PolicyValidator)
//! - Config: 통합 설정 (AgentConfig)
//! - Storage: 원자적 쓰기, StateStore
//! - Error: 에러 분류 (Error, ErrorKind, ErrorReport)
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Orchestrator (Layer3)                                  │
//! │        │                                                │
//! │        ▼                                                │
//! │  Policy Validator ──► Executor ──► Outcome Analyzer     │
//! │        │                               │                │
//! │        ▼                               ▼                │
//! │  Integration Manager ◄── Synthesizer ◄── Gap Detector   │
//! │        │                                                │
//! │        ▼                                                │
//! │  Capability Registry + plugins/ templates/ environments/│
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod policy;
pub mod storage;
pub mod types;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, ErrorKind, ErrorReport, Result};

// ============================================================================
// Types (데이터 모델)
// ============================================================================
pub use types::{
    // Intent
    extract_command,
    tokenize,
    CommandIntent,
    IntentSource,
    // Capability
    CapabilityKind,
    CapabilityRecord,
    CapabilityStatus,
    // Execution
    ExecutionResult,
    TIMEOUT_EXIT_CODE,
};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{
    AgentConfig, AgentSettings, ExecutorSettings, LlmSettings, PathSettings, PolicySettings,
    CONFIG_FILE,
};

// ============================================================================
// Policy (보안 게이트)
// ============================================================================
pub use policy::{
    PolicyAction, PolicyContext, PolicyRule, PolicyValidator, PolicyVerdict, RiskLevel,
    RulePattern, RuleScope, VerdictOutcome,
};

// ============================================================================
// Storage (저장소)
// ============================================================================
pub use storage::{atomic_write, StateStore};
