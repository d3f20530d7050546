//! Config - 통합 설정 관리
//!
//! - `agent.rs` - AgentConfig (llm, paths, executor, policy, agent)
//!
//! 로드 순서: 기본값 → 설정 파일(TOML) → 환경 변수 → CLI 플래그(호출자가 적용)

mod agent;

pub use agent::{
    AgentConfig, AgentSettings, ExecutorSettings, LlmSettings, PathSettings, PolicySettings,
    CONFIG_FILE, GLOBAL_CONFIG_FILE,
};
