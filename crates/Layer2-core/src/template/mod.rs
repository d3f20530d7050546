//! Capability 템플릿 - 카탈로그와 매니페스트 스키마
//!
//! - `catalog`: 종류별 고정 템플릿 (`command.v1`, `plugin.v1`, `template.v1`, `environment.v1`)
//! - `manifest`: 산출물 JSON 스키마, 구조 검사, 호출 렌더링

mod catalog;
mod manifest;

pub use catalog::{catalog, spec_by_id, spec_for, TemplateSpec};
pub use manifest::{
    is_valid_name, ArtifactManifest, CommandManifest, ContextTemplateManifest,
    EnvironmentManifest, PluginAction, PluginManifest, MAX_NAME_LEN,
};
