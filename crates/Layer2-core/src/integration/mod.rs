//! Integration Manager - 산출물을 검증하고 registry에 원자적으로 반영
//!
//! ```text
//! Artifact ──► 구조 재검사 ──► 중복 검사 ──► PolicyValidator (산출물 컨텍스트)
//!                                                  │ deny / 미확인 confirm
//!                                                  ├──────────► rejected record (파일 없음)
//!                                                  ▼ allow
//!              registry: pending ──► (이전 버전 보관) ──► 원자적 쓰기 ──► active
//!                           ▲                                  │ 실패
//!                           └──────────── 롤백 ◄───────────────┘
//! ```
//!
//! 불변식: registry의 active 확장 레코드는 항상 존재하는 파일을 가리킨다.
//! 확장 디렉토리에 쓰는 컴포넌트는 이 모듈뿐이다.

mod layout;
mod writer;

pub use layout::ExtensionLayout;
pub use writer::{ArtifactWriter, FsWriter};

use crate::registry::CapabilityRegistry;
use crate::synth::Artifact;
use crate::template::ArtifactManifest;
use anvil_foundation::{
    CapabilityKind, CapabilityRecord, CapabilityStatus, Error, PolicyContext, PolicyValidator,
    PolicyVerdict, Result,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 통합 옵션
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntegrateOptions {
    /// 같은 이름의 확장을 새 버전으로 교체
    pub replace: bool,

    /// confirm 판정에 대해 사용자가 이미 승인함
    pub confirmed: bool,
}

impl IntegrateOptions {
    pub fn replacing() -> Self {
        Self {
            replace: true,
            confirmed: false,
        }
    }

    pub fn confirmed(mut self) -> Self {
        self.confirmed = true;
        self
    }
}

/// 산출물 통합 관리자
pub struct IntegrationManager {
    registry: Arc<CapabilityRegistry>,
    validator: Arc<PolicyValidator>,
    layout: ExtensionLayout,
    working_root: PathBuf,
    writer: Arc<dyn ArtifactWriter>,
}

impl IntegrationManager {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        validator: Arc<PolicyValidator>,
        layout: ExtensionLayout,
        working_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            validator,
            layout,
            working_root: working_root.into(),
            writer: Arc::new(FsWriter),
        }
    }

    /// 파일 연산 교체 (장애 주입 테스트용)
    pub fn with_writer(mut self, writer: Arc<dyn ArtifactWriter>) -> Self {
        self.writer = writer;
        self
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    pub fn layout(&self) -> &ExtensionLayout {
        &self.layout
    }

    fn target_for(&self, artifact: &Artifact) -> Result<PathBuf> {
        self.layout
            .target_for(artifact.kind, artifact.name())
            .ok_or_else(|| Error::IntegrationRejected("builtin capabilities cannot be synthesized".to_string()))
    }

    /// 산출물 컨텍스트로 정책 검사 (쓰기 없음)
    ///
    /// 호출자가 confirm 판정을 미리 사용자에게 묻기 위해 쓴다.
    pub fn review(&self, artifact: &Artifact) -> Result<PolicyVerdict> {
        let target = self.target_for(artifact)?;
        let ctx = PolicyContext::for_artifact(&self.working_root, &self.layout.roots(), target);
        Ok(self.validator.validate(&artifact.manifest.policy_text(), &ctx))
    }

    /// 산출물을 검증하고 등록
    ///
    /// 정책이 거부하거나 confirm이 승인되지 않으면 파일을 쓰지 않고
    /// `Rejected` 상태의 레코드를 돌려준다 (registry는 변하지 않음).
    pub fn integrate(&self, artifact: Artifact, options: IntegrateOptions) -> Result<CapabilityRecord> {
        check_structure(&artifact)?;

        let name = artifact.name().to_string();
        let target = self.target_for(&artifact)?;

        let previous = self.registry.get(&name);
        if let Some(existing) = &previous {
            if existing.kind == CapabilityKind::Builtin {
                warn!("Refusing to shadow builtin capability '{}'", name);
                return Err(Error::DuplicateCapability(format!("'{}' is a builtin capability", name)));
            }
            if !options.replace {
                return Err(Error::DuplicateCapability(name));
            }
        }

        let record = CapabilityRecord::new(&name, artifact.kind, &artifact.declared_interface)
            .with_description(&artifact.metadata.description)
            .with_keywords(artifact.metadata.keywords.clone())
            .with_source(&target);

        let verdict = self.review(&artifact)?;
        if verdict.is_denied() {
            info!("Artifact '{}' rejected: {}", name, verdict.summary());
            return Ok(record.rejected(verdict.reason));
        }
        if verdict.needs_confirmation() && !options.confirmed {
            info!("Artifact '{}' not confirmed: {}", name, verdict.summary());
            return Ok(record.rejected(format!("confirmation required: {}", verdict.reason)));
        }

        let contents = artifact.manifest.to_json()?;
        self.commit(record, previous, &target, contents.as_bytes())
    }

    /// pending 등록 → 이전 파일 보관 → 쓰기 → active
    fn commit(
        &self,
        record: CapabilityRecord,
        previous: Option<CapabilityRecord>,
        target: &Path,
        contents: &[u8],
    ) -> Result<CapabilityRecord> {
        let name = record.name.clone();
        let kind = record.kind;

        // 이전 버전 (등록된 것 또는 registry에 없는 고아 파일)
        let existing_file = match &previous {
            Some(prev) => prev.source_path().map(Path::to_path_buf),
            None => Some(target.to_path_buf()),
        }
        .filter(|path| self.writer.exists(path));

        let base_version = previous.as_ref().map(|p| p.version).unwrap_or(1);
        let (archive, version) = match &existing_file {
            Some(_) => {
                let archived = self.free_archive_version(kind, &name, base_version);
                (self.layout.archive_for(kind, &name, archived), archived + 1)
            }
            None => (None, previous.as_ref().map(|p| p.version + 1).unwrap_or(1)),
        };

        let record = record.with_version(version).with_status(CapabilityStatus::PendingValidation);
        self.registry.register(record, previous.is_some())?;

        let mut moved: Option<(PathBuf, PathBuf)> = None;
        if let (Some(from), Some(to)) = (existing_file, archive) {
            if let Err(e) = self.writer.rename(&from, &to) {
                self.roll_back(&name, previous, None);
                return Err(Error::Storage(format!(
                    "failed to archive {}: {}",
                    from.display(),
                    e
                )));
            }
            debug!("Archived {} -> {}", from.display(), to.display());
            moved = Some((from, to));
        }

        if let Err(e) = self.writer.write(target, contents) {
            self.roll_back(&name, previous, moved);
            return Err(Error::Storage(format!("failed to write {}: {}", target.display(), e)));
        }

        self.registry.set_status(&name, CapabilityStatus::Active)?;
        let record = self
            .registry
            .get(&name)
            .ok_or_else(|| Error::CapabilityNotFound(name.clone()))?;

        info!(
            "Integrated {} '{}' v{} at {}",
            record.kind,
            record.name,
            record.version,
            target.display()
        );
        Ok(record)
    }

    /// 쓰기 실패 후 registry와 파일을 이전 상태로 되돌림
    fn roll_back(&self, name: &str, previous: Option<CapabilityRecord>, moved: Option<(PathBuf, PathBuf)>) {
        let restored_file = match moved {
            Some((original, archived)) => match self.writer.rename(&archived, &original) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Failed to restore {}: {}", original.display(), e);
                    false
                }
            },
            None => true,
        };

        match previous {
            Some(prev) if restored_file => {
                if let Err(e) = self.registry.register(prev, true) {
                    warn!("Failed to restore record '{}': {}", name, e);
                    self.registry.remove(name);
                }
            }
            _ => {
                self.registry.remove(name);
            }
        }
        warn!("Rolled back integration of '{}'", name);
    }

    fn free_archive_version(&self, kind: CapabilityKind, name: &str, from: u32) -> u32 {
        let mut version = from.max(1);
        while self
            .layout
            .archive_for(kind, name, version)
            .map(|path| self.writer.exists(&path))
            .unwrap_or(false)
        {
            version += 1;
        }
        version
    }

    /// 파일이 사라진 확장 레코드와 남은 pending 레코드 제거
    ///
    /// 세션 복원 직후 호출한다. 제거한 이름을 돌려준다.
    pub fn reconcile(&self) -> Vec<String> {
        let mut removed = Vec::new();

        for record in self.registry.list(None) {
            if record.kind == CapabilityKind::Builtin {
                continue;
            }
            let present = record
                .source_path()
                .map(|path| self.writer.exists(path))
                .unwrap_or(false);
            if record.status != CapabilityStatus::Active || !present {
                self.registry.remove(&record.name);
                warn!("Dropped capability '{}' (status {:?}, file present: {})", record.name, record.status, present);
                removed.push(record.name);
            }
        }

        removed
    }
}

/// 통합 직전 구조 재검사 (합성 이후 변경 방지)
fn check_structure(artifact: &Artifact) -> Result<()> {
    artifact.manifest.validate()?;

    if artifact.kind != artifact.manifest.kind() {
        return Err(Error::SynthesisSchemaError(format!(
            "artifact kind {} does not match manifest kind {}",
            artifact.kind,
            artifact.manifest.kind()
        )));
    }

    let reparsed: ArtifactManifest = serde_json::from_str(&artifact.generated_source)
        .map_err(|e| Error::SynthesisSchemaError(format!("generated source is not a manifest: {}", e)))?;
    if reparsed != artifact.manifest {
        return Err(Error::SynthesisSchemaError(
            "generated source differs from the validated manifest".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::ArtifactMetadata;
    use crate::template::spec_for;
    use chrono::Utc;
    use uuid::Uuid;

    fn artifact(kind: CapabilityKind, name: &str) -> Artifact {
        let spec = spec_for(kind).unwrap();
        let mut value: serde_json::Value = serde_json::from_str(spec.example).unwrap();
        value["name"] = serde_json::Value::String(name.to_string());
        let manifest = ArtifactManifest::from_value(kind, value).unwrap();
        let metadata = ArtifactMetadata {
            name: name.to_string(),
            description: manifest.description().to_string(),
            keywords: manifest.keywords(),
            attempts: 1,
            confidence: 0.9,
            model: "scripted".to_string(),
            generated_at: Utc::now(),
            request_text: format!("manage {}", name),
            intent_ref: Uuid::new_v4(),
        };
        Artifact::from_manifest(manifest, spec.id, metadata).unwrap()
    }

    fn manager(dir: &Path) -> IntegrationManager {
        IntegrationManager::new(
            Arc::new(CapabilityRegistry::with_builtins()),
            Arc::new(PolicyValidator::new()),
            ExtensionLayout::under(dir),
            dir,
        )
    }

    #[test]
    fn test_integrate_writes_and_activates() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());

        let record = manager
            .integrate(artifact(CapabilityKind::Plugin, "docker"), IntegrateOptions::default())
            .unwrap();

        assert_eq!(record.status, CapabilityStatus::Active);
        assert_eq!(record.version, 1);
        let path = dir.path().join("plugins/docker.json");
        assert_eq!(record.source_path(), Some(path.as_path()));
        assert!(path.is_file());
        assert!(ArtifactManifest::load(&path).is_ok());
    }

    #[test]
    fn test_replace_archives_previous_version() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());

        manager
            .integrate(artifact(CapabilityKind::Command, "count-lines"), IntegrateOptions::default())
            .unwrap();
        let record = manager
            .integrate(artifact(CapabilityKind::Command, "count-lines"), IntegrateOptions::replacing())
            .unwrap();

        assert_eq!(record.version, 2);
        assert!(dir.path().join("plugins/commands/count-lines.json").is_file());
        assert!(dir.path().join("plugins/commands/count-lines.v1.json").is_file());
    }

    #[test]
    fn test_orphan_file_is_archived() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let orphan = dir.path().join("templates/code-review.json");
        std::fs::create_dir_all(orphan.parent().unwrap()).unwrap();
        std::fs::write(&orphan, "{}").unwrap();

        let record = manager
            .integrate(artifact(CapabilityKind::Template, "code-review"), IntegrateOptions::default())
            .unwrap();

        assert_eq!(record.version, 2);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("templates/code-review.v1.json")).unwrap(),
            "{}"
        );
    }

    #[test]
    fn test_builtin_name_cannot_be_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());

        let err = manager
            .integrate(artifact(CapabilityKind::Command, "ls"), IntegrateOptions::replacing())
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateCapability(_)));
        assert_eq!(manager.registry().get("ls").unwrap().kind, CapabilityKind::Builtin);
    }

    #[test]
    fn test_tampered_source_is_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let mut tampered = artifact(CapabilityKind::Command, "count-lines");
        tampered.generated_source = tampered.generated_source.replace("wc -l", "rm -rf /");

        let err = manager.integrate(tampered, IntegrateOptions::default()).unwrap_err();
        assert!(matches!(err, Error::SynthesisSchemaError(_)));
        assert!(!manager.registry().contains("count-lines"));
    }

    #[test]
    fn test_reconcile_drops_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        manager
            .integrate(artifact(CapabilityKind::Plugin, "docker"), IntegrateOptions::default())
            .unwrap();
        manager
            .registry()
            .register(
                CapabilityRecord::new("ghost", CapabilityKind::Command, "ghost")
                    .with_status(CapabilityStatus::Active)
                    .with_source(dir.path().join("plugins/commands/ghost.json")),
                false,
            )
            .unwrap();

        let removed = manager.reconcile();

        assert_eq!(removed, vec!["ghost".to_string()]);
        assert!(manager.registry().contains("docker"));
        assert!(manager.registry().contains("ls"));
    }
}
