//! AgentConfig - Anvil 통합 설정

use crate::policy::restricted_roots;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// 프로젝트 설정 파일명 (작업 디렉토리 기준)
pub const CONFIG_FILE: &str = "anvil.toml";

/// 글로벌 설정 파일명 (~/.config/anvil/ 기준)
pub const GLOBAL_CONFIG_FILE: &str = "config.toml";

// ============================================================================
// AgentConfig
// ============================================================================

/// 시작 시 한 번 로드되어 Orchestrator에 불변으로 전달되는 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub llm: LlmSettings,
    pub paths: PathSettings,
    pub executor: ExecutorSettings,
    pub policy: PolicySettings,
    pub agent: AgentSettings,
}

impl AgentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load
    // ========================================================================

    /// 설정 파일 + 환경 변수 로드
    ///
    /// `explicit`가 있으면 그 파일만 본다. 없으면 프로젝트 → 글로벌 순으로 첫 번째 파일.
    pub fn load(explicit: Option<&Path>, working_dir: &Path) -> Result<Self> {
        let mut config = match Self::locate(explicit, working_dir)? {
            Some(path) => {
                debug!("Loading config from {}", path.display());
                Self::from_file(&path)?
            }
            None => Self::default(),
        };

        if config.paths.working_dir == Path::new(".") {
            config.paths.working_dir = working_dir.to_path_buf();
        }
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn locate(explicit: Option<&Path>, working_dir: &Path) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            return Ok(Some(path.to_path_buf()));
        }

        let project = working_dir.join(CONFIG_FILE);
        if project.exists() {
            return Ok(Some(project));
        }

        Ok(Self::global_dir()
            .map(|dir| dir.join(GLOBAL_CONFIG_FILE))
            .filter(|p| p.exists()))
    }

    /// 글로벌 설정 디렉토리 (~/.config/anvil)
    pub fn global_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("anvil"))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// 환경 변수 오버라이드 (`LLM_*`)
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("LLM_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.llm.api_key = Some(key);
        }
        if let Some(host) = lookup("LLM_API_HOST") {
            self.llm.api_host = host;
        }
        if let Some(model) = lookup("LLM_MODEL_NAME") {
            self.llm.model = model;
        }
        if let Some(t) = lookup("LLM_TEMPERATURE").and_then(|v| v.parse().ok()) {
            self.llm.temperature = t;
        }
        if let Some(n) = lookup("LLM_MAX_TOKENS").and_then(|v| v.parse().ok()) {
            self.llm.max_tokens = n;
        }
        if let Some(p) = lookup("LLM_TOP_P").and_then(|v| v.parse().ok()) {
            self.llm.top_p = p;
        }
    }

    /// 시작 전 필수 항목 확인
    pub fn validate(&self) -> Result<()> {
        match self.llm.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => {}
            _ => {
                return Err(Error::Config(
                    "LLM API key is required (use --api-key or LLM_API_KEY)".to_string(),
                ))
            }
        }
        if self.executor.timeout_secs == 0 {
            return Err(Error::Config("executor.timeout_secs must be > 0".to_string()));
        }
        if self.agent.synthesis_timeout_secs == 0 {
            return Err(Error::Config("agent.synthesis_timeout_secs must be > 0".to_string()));
        }
        if self.executor.max_output_bytes == 0 {
            return Err(Error::Config("executor.max_output_bytes must be > 0".to_string()));
        }
        Ok(())
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.llm.api_key = Some(key.into());
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.paths.working_dir = dir.into();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.executor.timeout_secs = secs;
        self
    }
}

// ============================================================================
// LLM
// ============================================================================

/// LLM 클라이언트 설정 (OpenAI 호환 API)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// API 키
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// API 베이스 URL
    pub api_host: String,

    /// 모델 이름
    pub model: String,

    pub temperature: f32,

    pub max_tokens: u32,

    pub top_p: f32,

    /// 합성 요청 타임아웃 (Executor 타임아웃과 별개)
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_host: "https://llm.chutes.ai/v1".to_string(),
            model: "chutesai/Llama-4-Scout-17B-16E-Instruct".to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            top_p: 0.9,
            timeout_secs: 120,
        }
    }
}

// ============================================================================
// Paths
// ============================================================================

/// 파일 시스템 레이아웃 (상대 경로는 working_dir 기준)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub working_dir: PathBuf,
    pub plugins_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub environments_dir: PathBuf,
    pub data_dir: PathBuf,
    pub state_file: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("."),
            plugins_dir: PathBuf::from("plugins"),
            templates_dir: PathBuf::from("templates"),
            environments_dir: PathBuf::from("environments"),
            data_dir: PathBuf::from("data"),
            state_file: PathBuf::from("anvil_state.json"),
        }
    }
}

impl PathSettings {
    /// 작업 루트 기준으로 해석
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        }
    }

    pub fn plugins(&self) -> PathBuf {
        self.resolve(&self.plugins_dir)
    }

    pub fn templates(&self) -> PathBuf {
        self.resolve(&self.templates_dir)
    }

    pub fn environments(&self) -> PathBuf {
        self.resolve(&self.environments_dir)
    }

    pub fn data(&self) -> PathBuf {
        self.resolve(&self.data_dir)
    }

    pub fn state(&self) -> PathBuf {
        self.resolve(&self.state_file)
    }

    /// 자기 확장 산출물이 쓰일 수 있는 루트들
    pub fn extension_roots(&self) -> Vec<PathBuf> {
        vec![self.plugins(), self.templates(), self.environments()]
    }

    /// 일반 명령이 쓸 수 있는 루트들 (확장 루트 + 데이터)
    pub fn command_writable_roots(&self) -> Vec<PathBuf> {
        let mut roots = self.extension_roots();
        roots.push(self.data());
        roots
    }
}

// ============================================================================
// Executor
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    /// 명령 타임아웃 (초)
    pub timeout_secs: u64,

    /// stdout/stderr 각각의 캡처 상한 (바이트)
    pub max_output_bytes: usize,

    /// 실행 셸
    pub shell: String,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_output_bytes: 64 * 1024,
            shell: "sh".to_string(),
        }
    }
}

// ============================================================================
// Policy
// ============================================================================

/// 사용자 정책 설정 (기본 규칙에 추가)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    /// 명령 길이 상한
    pub max_command_length: usize,

    /// 추가 거부 정규식
    pub deny_patterns: Vec<String>,

    /// 추가 확인 정규식
    pub confirm_patterns: Vec<String>,

    /// 추가 허용 정규식
    pub allow_patterns: Vec<String>,

    /// 추가 safe verb
    pub extra_safe_verbs: Vec<String>,

    /// 쓰기 금지 디렉토리
    pub restricted_dirs: Vec<PathBuf>,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            max_command_length: crate::policy::DEFAULT_MAX_COMMAND_LENGTH,
            deny_patterns: Vec::new(),
            confirm_patterns: Vec::new(),
            allow_patterns: Vec::new(),
            extra_safe_verbs: Vec::new(),
            restricted_dirs: restricted_roots(),
        }
    }
}

// ============================================================================
// Agent
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// 자기 확장 사용 여부
    pub self_extension: bool,

    /// 실패 시 LLM 후속 분석
    pub llm_analysis: bool,

    /// 메모리에 보관할 명령 기록 수
    pub history_limit: usize,

    /// 확장 산출물 합성 LLM 호출 타임아웃 (초)
    pub synthesis_timeout_secs: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            self_extension: true,
            llm_analysis: true,
            history_limit: 100,
            synthesis_timeout_secs: 120,
        }
    }
}
