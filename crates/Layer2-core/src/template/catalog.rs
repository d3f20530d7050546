//! Template Catalog - capability 종류별 고정 템플릿 정의
//!
//! 각 템플릿은 필수 필드 목록과 정식 예시(canonical example)를 가진다.
//! 예시는 LLM 프롬프트에 그대로 들어가므로 유효한 JSON이어야 한다.

use anvil_foundation::CapabilityKind;

/// 템플릿 정의
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateSpec {
    /// 템플릿 ID (예: `plugin.v1`)
    pub id: &'static str,

    /// 생성되는 capability 종류
    pub kind: CapabilityKind,

    /// 최상위 필수 필드
    pub required_fields: &'static [&'static str],

    /// 프롬프트에 들어갈 설명
    pub guidance: &'static str,

    /// 정식 예시 (JSON)
    pub example: &'static str,
}

const COMMAND_EXAMPLE: &str = r#"{
  "name": "count-lines",
  "description": "Count lines in every file matching a glob",
  "usage": "count-lines <glob>",
  "script": "wc -l {args}"
}"#;

const PLUGIN_EXAMPLE: &str = r#"{
  "name": "docker",
  "description": "Inspect and manage docker containers",
  "version": "1.0.0",
  "actions": [
    { "action": "containers", "description": "List all containers", "command": "docker ps -a" },
    { "action": "images", "description": "List local images", "command": "docker images" },
    { "action": "logs", "description": "Show container logs", "command": "docker logs --tail 100 {args}" }
  ]
}"#;

const TEMPLATE_EXAMPLE: &str = r#"{
  "name": "code-review",
  "description": "Structured context for reviewing a source file",
  "version": "1.0.0",
  "prompt_template": "Review the file {file} focusing on {focus}. Report issues as a list.",
  "input_schema": {
    "type": "object",
    "properties": { "file": { "type": "string" }, "focus": { "type": "string" } },
    "required": ["file"]
  },
  "output_schema": {
    "type": "object",
    "properties": { "issues": { "type": "array", "items": { "type": "string" } } }
  },
  "examples": [ { "file": "src/main.rs", "focus": "error handling" } ]
}"#;

const ENVIRONMENT_EXAMPLE: &str = r#"{
  "name": "node20",
  "description": "Node.js 20 runtime for running project scripts",
  "base_image": "node:20-slim",
  "dockerfile": "FROM node:20-slim\nWORKDIR /app",
  "build_command": "docker build -t anvil-node20 .",
  "run_command": "docker run --rm -v \"$PWD\":/app anvil-node20 {args}"
}"#;

const CATALOG: &[TemplateSpec] = &[
    TemplateSpec {
        id: "command.v1",
        kind: CapabilityKind::Command,
        required_fields: &["name", "description", "usage", "script"],
        guidance: "A single CLI-style shell command. `script` is one shell line; `{args}` is replaced with the caller's arguments.",
        example: COMMAND_EXAMPLE,
    },
    TemplateSpec {
        id: "plugin.v1",
        kind: CapabilityKind::Plugin,
        required_fields: &["name", "description", "version", "actions"],
        guidance: "A plugin groups related actions. Each action maps to one shell command; `{args}` is replaced with the remaining arguments.",
        example: PLUGIN_EXAMPLE,
    },
    TemplateSpec {
        id: "template.v1",
        kind: CapabilityKind::Template,
        required_fields: &[
            "name",
            "description",
            "version",
            "prompt_template",
            "input_schema",
            "output_schema",
        ],
        guidance: "A structured-context template. `prompt_template` uses `{field}` placeholders declared in `input_schema`.",
        example: TEMPLATE_EXAMPLE,
    },
    TemplateSpec {
        id: "environment.v1",
        kind: CapabilityKind::EnvironmentDef,
        required_fields: &[
            "name",
            "description",
            "base_image",
            "dockerfile",
            "build_command",
            "run_command",
        ],
        guidance: "A container environment definition. Only `run_command` is invoked; `{args}` is replaced with the caller's arguments.",
        example: ENVIRONMENT_EXAMPLE,
    },
];

/// 전체 카탈로그
pub fn catalog() -> &'static [TemplateSpec] {
    CATALOG
}

/// 종류에 해당하는 템플릿 (builtin은 없음)
pub fn spec_for(kind: CapabilityKind) -> Option<&'static TemplateSpec> {
    CATALOG.iter().find(|spec| spec.kind == kind)
}

/// ID로 템플릿 조회
pub fn spec_by_id(id: &str) -> Option<&'static TemplateSpec> {
    CATALOG.iter().find(|spec| spec.id == id)
}
