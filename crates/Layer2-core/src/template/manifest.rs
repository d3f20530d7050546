//! Artifact Manifest - 종류별 산출물 스키마
//!
//! 디스크에는 `kind` 태그가 붙은 JSON으로 저장된다.

use super::catalog::spec_for;
use anvil_foundation::{tokenize, CapabilityKind, CommandIntent, Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

/// capability 이름 최대 길이
pub const MAX_NAME_LEN: usize = 64;

// ============================================================================
// 종류별 매니페스트
// ============================================================================

/// 합성된 CLI 스타일 명령
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandManifest {
    pub name: String,
    pub description: String,
    /// 사용법 (호출 문법)
    pub usage: String,
    /// 셸 한 줄, `{args}` 자리에 인자
    pub script: String,
}

/// 플러그인 action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginAction {
    pub action: String,
    #[serde(default)]
    pub description: String,
    pub command: String,
}

/// 여러 action을 가진 플러그인
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub name: String,
    pub description: String,
    pub version: String,
    pub actions: Vec<PluginAction>,
}

impl PluginManifest {
    pub fn action(&self, name: &str) -> Option<&PluginAction> {
        self.actions
            .iter()
            .find(|a| a.action.eq_ignore_ascii_case(name))
    }
}

/// 구조화 컨텍스트 템플릿
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextTemplateManifest {
    pub name: String,
    pub description: String,
    pub version: String,
    pub prompt_template: String,
    pub input_schema: Value,
    pub output_schema: Value,
    #[serde(default)]
    pub examples: Vec<Value>,
}

/// 컨테이너 환경 정의
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentManifest {
    pub name: String,
    pub description: String,
    pub base_image: String,
    pub dockerfile: String,
    pub build_command: String,
    pub run_command: String,
}

// ============================================================================
// ArtifactManifest
// ============================================================================

/// 종류 태그가 붙은 매니페스트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ArtifactManifest {
    Command(CommandManifest),
    Plugin(PluginManifest),
    Template(ContextTemplateManifest),
    EnvironmentDef(EnvironmentManifest),
}

impl ArtifactManifest {
    /// LLM이 만든 JSON을 주어진 종류로 해석하고 구조 검사
    pub fn parse(kind: CapabilityKind, json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| Error::SynthesisSchemaError(format!("response is not valid JSON: {}", e)))?;
        Self::from_value(kind, value)
    }

    /// JSON 값을 주어진 종류로 해석하고 구조 검사
    pub fn from_value(kind: CapabilityKind, value: Value) -> Result<Self> {
        let spec = spec_for(kind).ok_or_else(|| {
            Error::SynthesisSchemaError(format!("no template for kind '{}'", kind))
        })?;

        let object = value.as_object().ok_or_else(|| {
            Error::SynthesisSchemaError("top-level value must be a JSON object".to_string())
        })?;
        let missing: Vec<&str> = spec
            .required_fields
            .iter()
            .copied()
            .filter(|field| object.get(*field).map_or(true, Value::is_null))
            .collect();
        if !missing.is_empty() {
            return Err(Error::SynthesisSchemaError(format!(
                "{} is missing required fields: {}",
                spec.id,
                missing.join(", ")
            )));
        }

        let schema_err = |e: serde_json::Error| Error::SynthesisSchemaError(format!("{}: {}", spec.id, e));
        let manifest = match kind {
            CapabilityKind::Command => {
                ArtifactManifest::Command(serde_json::from_value(value).map_err(schema_err)?)
            }
            CapabilityKind::Plugin => {
                ArtifactManifest::Plugin(serde_json::from_value(value).map_err(schema_err)?)
            }
            CapabilityKind::Template => {
                ArtifactManifest::Template(serde_json::from_value(value).map_err(schema_err)?)
            }
            CapabilityKind::EnvironmentDef => {
                ArtifactManifest::EnvironmentDef(serde_json::from_value(value).map_err(schema_err)?)
            }
            CapabilityKind::Builtin => {
                return Err(Error::SynthesisSchemaError(
                    "builtin capabilities cannot be synthesized".to_string(),
                ))
            }
        };

        manifest.validate()?;
        Ok(manifest)
    }

    /// 디스크의 매니페스트 파일 로드
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Storage(format!("failed to read manifest {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            Error::Storage(format!("invalid manifest {}: {}", path.display(), e))
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    // ========================================================================
    // 구조 검사
    // ========================================================================

    /// 필드 값 검사 (필드 존재는 `from_value`에서 확인)
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if !is_valid_name(self.name()) {
            problems.push(format!(
                "name '{}' must match [a-z0-9][a-z0-9_-]* (max {} chars)",
                self.name(),
                MAX_NAME_LEN
            ));
        }
        if self.description().trim().is_empty() {
            problems.push("description is empty".to_string());
        }

        match self {
            ArtifactManifest::Command(m) => {
                require(&mut problems, "usage", &m.usage);
                require(&mut problems, "script", &m.script);
            }
            ArtifactManifest::Plugin(m) => {
                if m.actions.is_empty() {
                    problems.push("actions must not be empty".to_string());
                }
                let mut seen = std::collections::HashSet::new();
                for action in &m.actions {
                    if action.action.trim().is_empty() || action.command.trim().is_empty() {
                        problems.push("every action needs an action name and a command".to_string());
                    }
                    if !seen.insert(action.action.to_lowercase()) {
                        problems.push(format!("duplicate action '{}'", action.action));
                    }
                }
            }
            ArtifactManifest::Template(m) => {
                require(&mut problems, "prompt_template", &m.prompt_template);
                if !m.input_schema.is_object() {
                    problems.push("input_schema must be an object".to_string());
                }
                if !m.output_schema.is_object() {
                    problems.push("output_schema must be an object".to_string());
                }
            }
            ArtifactManifest::EnvironmentDef(m) => {
                require(&mut problems, "base_image", &m.base_image);
                require(&mut problems, "dockerfile", &m.dockerfile);
                require(&mut problems, "run_command", &m.run_command);
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::SynthesisSchemaError(problems.join("; ")))
        }
    }

    // ========================================================================
    // 접근자
    // ========================================================================

    pub fn kind(&self) -> CapabilityKind {
        match self {
            ArtifactManifest::Command(_) => CapabilityKind::Command,
            ArtifactManifest::Plugin(_) => CapabilityKind::Plugin,
            ArtifactManifest::Template(_) => CapabilityKind::Template,
            ArtifactManifest::EnvironmentDef(_) => CapabilityKind::EnvironmentDef,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ArtifactManifest::Command(m) => &m.name,
            ArtifactManifest::Plugin(m) => &m.name,
            ArtifactManifest::Template(m) => &m.name,
            ArtifactManifest::EnvironmentDef(m) => &m.name,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            ArtifactManifest::Command(m) => &m.description,
            ArtifactManifest::Plugin(m) => &m.description,
            ArtifactManifest::Template(m) => &m.description,
            ArtifactManifest::EnvironmentDef(m) => &m.description,
        }
    }

    /// 종류별 고정 스키마에 따른 호출 문법
    pub fn invocation_grammar(&self) -> String {
        match self {
            ArtifactManifest::Command(m) => {
                if m.usage.split_whitespace().next() == Some(m.name.as_str()) {
                    m.usage.clone()
                } else {
                    format!("{} [args...]", m.name)
                }
            }
            ArtifactManifest::Plugin(m) => {
                let actions: Vec<&str> = m.actions.iter().map(|a| a.action.as_str()).collect();
                format!("{} <{}> [args...]", m.name, actions.join("|"))
            }
            ArtifactManifest::Template(m) => format!("{} [key=value...]", m.name),
            ArtifactManifest::EnvironmentDef(m) => format!("{} [args...]", m.name),
        }
    }

    /// 정책 검사 대상 텍스트 (실행되거나 렌더링될 내용 전부)
    pub fn policy_text(&self) -> String {
        match self {
            ArtifactManifest::Command(m) => m.script.clone(),
            ArtifactManifest::Plugin(m) => m
                .actions
                .iter()
                .map(|a| a.command.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
            ArtifactManifest::Template(m) => m.prompt_template.clone(),
            ArtifactManifest::EnvironmentDef(m) => {
                format!("{}\n{}\n{}", m.dockerfile, m.build_command, m.run_command)
            }
        }
    }

    /// 의도 매칭용 키워드 (이름, action, 설명 단어)
    pub fn keywords(&self) -> Vec<String> {
        let mut words = vec![self.name().to_lowercase()];
        if let ArtifactManifest::Plugin(m) = self {
            words.extend(m.actions.iter().map(|a| a.action.to_lowercase()));
        }
        words.extend(
            self.description()
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| w.len() >= 3 && !STOPWORDS.contains(&w.to_lowercase().as_str()))
                .map(str::to_lowercase),
        );
        let mut seen = std::collections::HashSet::new();
        words.retain(|w| seen.insert(w.clone()));
        words
    }

    // ========================================================================
    // 호출 렌더링
    // ========================================================================

    /// intent를 실제 셸 명령으로 변환
    pub fn render(&self, intent: &CommandIntent) -> String {
        let args = trailing_args(intent, self.name());
        let named = named_args(intent);

        match self {
            ArtifactManifest::Command(m) => {
                if m.script.contains("{args}") {
                    fill(&m.script, &named, &args, true)
                } else if args.is_empty() {
                    fill(&m.script, &named, &[], true)
                } else {
                    format!("{} {}", fill(&m.script, &named, &[], true), join_quoted(&args))
                }
            }
            ArtifactManifest::Plugin(m) => {
                let selected = args
                    .first()
                    .and_then(|first| m.action(first))
                    .map(|action| (action, &args[1..]));
                match selected {
                    Some((action, rest)) => fill(&action.command, &named, rest, true),
                    None => m
                        .actions
                        .first()
                        .map(|action| fill(&action.command, &named, &[], true))
                        .unwrap_or_default(),
                }
            }
            ArtifactManifest::Template(m) => {
                let rendered = fill(&m.prompt_template, &named, &args, false);
                format!("printf '%s\\n' {}", quote(&rendered))
            }
            ArtifactManifest::EnvironmentDef(m) => fill(&m.run_command, &named, &args, true),
        }
    }
}

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "into", "that", "this", "all", "any", "every", "each",
    "using", "via", "your", "its",
];

fn require(problems: &mut Vec<String>, field: &str, value: &str) {
    if value.trim().is_empty() {
        problems.push(format!("{} is empty", field));
    }
}

fn name_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").ok())
        .as_ref()
}

/// 파일 이름으로도 쓰이므로 경로 구분자와 대문자를 허용하지 않는다
pub fn is_valid_name(name: &str) -> bool {
    name.len() <= MAX_NAME_LEN && name_re().map_or(false, |re| re.is_match(name))
}

/// 원문에서 capability 이름 뒤에 오는 위치 인자
fn trailing_args(intent: &CommandIntent, name: &str) -> Vec<String> {
    let tokens = tokenize(&intent.raw_text);
    let Some(index) = tokens.iter().position(|t| t.eq_ignore_ascii_case(name)) else {
        return Vec::new();
    };
    tokens
        .into_iter()
        .skip(index + 1)
        .filter(|t| !is_named(t))
        .collect()
}

fn is_named(token: &str) -> bool {
    let stripped = token.strip_prefix("--").unwrap_or(token);
    stripped
        .split_once('=')
        .map_or(false, |(k, _)| !k.is_empty() && k.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'))
}

fn named_args(intent: &CommandIntent) -> BTreeMap<String, String> {
    intent
        .parsed_arguments
        .iter()
        .filter(|(k, _)| {
            !(k.starts_with("arg") && k[3..].chars().all(|c| c.is_ascii_digit()) && k.len() > 3)
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// `{key}`와 `{args}` 치환
fn fill(template: &str, named: &BTreeMap<String, String>, args: &[String], shell: bool) -> String {
    let mut out = template.to_string();
    for (key, value) in named {
        let replacement = if shell { quote(value) } else { value.clone() };
        out = out.replace(&format!("{{{}}}", key), &replacement);
    }
    let joined = if shell { join_quoted(args) } else { args.join(" ") };
    out.replace("{args}", &joined).trim().to_string()
}

fn quote(value: &str) -> String {
    let cleaned = value.replace('\0', "");
    shlex::try_quote(&cleaned)
        .map(|q| q.into_owned())
        .unwrap_or_else(|_| "''".to_string())
}

fn join_quoted(args: &[String]) -> String {
    args.iter().map(|a| quote(a)).collect::<Vec<_>>().join(" ")
}
