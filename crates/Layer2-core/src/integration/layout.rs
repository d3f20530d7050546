//! 확장 디렉토리 배치

use anvil_foundation::{CapabilityKind, PathSettings};
use std::path::{Path, PathBuf};

/// 종류별 산출물 저장 위치
///
/// ```text
/// plugins/<name>.json            plugin
/// plugins/commands/<name>.json   command
/// templates/<name>.json          template
/// environments/<name>.json       environment
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionLayout {
    pub plugins: PathBuf,
    pub templates: PathBuf,
    pub environments: PathBuf,
}

impl ExtensionLayout {
    pub fn new(
        plugins: impl Into<PathBuf>,
        templates: impl Into<PathBuf>,
        environments: impl Into<PathBuf>,
    ) -> Self {
        Self {
            plugins: plugins.into(),
            templates: templates.into(),
            environments: environments.into(),
        }
    }

    /// 하나의 기준 디렉토리 아래 기본 배치
    pub fn under(base: &Path) -> Self {
        Self::new(
            base.join("plugins"),
            base.join("templates"),
            base.join("environments"),
        )
    }

    pub fn from_paths(paths: &PathSettings) -> Self {
        Self::new(paths.plugins(), paths.templates(), paths.environments())
    }

    pub fn commands(&self) -> PathBuf {
        self.plugins.join("commands")
    }

    /// 정책 검사에 쓰이는 쓰기 허용 루트
    pub fn roots(&self) -> Vec<PathBuf> {
        vec![
            self.plugins.clone(),
            self.templates.clone(),
            self.environments.clone(),
        ]
    }

    fn dir_for(&self, kind: CapabilityKind) -> Option<PathBuf> {
        match kind {
            CapabilityKind::Builtin => None,
            CapabilityKind::Command => Some(self.commands()),
            CapabilityKind::Plugin => Some(self.plugins.clone()),
            CapabilityKind::Template => Some(self.templates.clone()),
            CapabilityKind::EnvironmentDef => Some(self.environments.clone()),
        }
    }

    /// 산출물 파일 경로 (builtin은 파일이 없음)
    pub fn target_for(&self, kind: CapabilityKind, name: &str) -> Option<PathBuf> {
        self.dir_for(kind).map(|dir| dir.join(format!("{}.json", name)))
    }

    /// 이전 버전 보관 경로 (`<name>.v<N>.json`)
    pub fn archive_for(&self, kind: CapabilityKind, name: &str, version: u32) -> Option<PathBuf> {
        self.dir_for(kind)
            .map(|dir| dir.join(format!("{}.v{}.json", name, version)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets_per_kind() {
        let layout = ExtensionLayout::under(Path::new("/x"));
        assert_eq!(
            layout.target_for(CapabilityKind::Command, "backup"),
            Some(PathBuf::from("/x/plugins/commands/backup.json"))
        );
        assert_eq!(
            layout.target_for(CapabilityKind::Plugin, "docker"),
            Some(PathBuf::from("/x/plugins/docker.json"))
        );
        assert_eq!(
            layout.target_for(CapabilityKind::EnvironmentDef, "node20"),
            Some(PathBuf::from("/x/environments/node20.json"))
        );
        assert_eq!(layout.target_for(CapabilityKind::Builtin, "ls"), None);
    }

    #[test]
    fn test_archive_path() {
        let layout = ExtensionLayout::under(Path::new("/x"));
        assert_eq!(
            layout.archive_for(CapabilityKind::Template, "review", 2),
            Some(PathBuf::from("/x/templates/review.v2.json"))
        );
    }
}
