//! PolicyContext - 검증 시점의 환경 정보

use super::rule::path_is_under;
use crate::types::IntentSource;
use std::path::{Component, Path, PathBuf};

/// 검증 컨텍스트
///
/// 검증은 항상 호출 시점의 컨텍스트로 새로 수행된다 (작업 디렉토리나 규칙이 바뀔 수 있음).
#[derive(Debug, Clone)]
pub struct PolicyContext {
    /// 요청 출처
    pub source: IntentSource,

    /// 작업 루트 (이 밖의 경로 참조는 path traversal)
    pub working_root: PathBuf,

    /// 상대 경로 기준 디렉토리
    pub cwd: PathBuf,

    /// 쓰기가 허용된 루트들
    pub writable_roots: Vec<PathBuf>,

    /// 쓰기가 금지된 루트들 (/etc, /var ...)
    pub restricted_roots: Vec<PathBuf>,

    /// 민감 경로 glob (~ 확장 전)
    pub sensitive_patterns: Vec<String>,

    /// 산출물 검증일 때 저장 대상 경로
    pub target_path: Option<PathBuf>,
}

impl PolicyContext {
    pub fn new(working_root: impl Into<PathBuf>) -> Self {
        let working_root = normalize(&working_root.into());
        Self {
            source: IntentSource::User,
            cwd: working_root.clone(),
            writable_roots: vec![working_root.clone()],
            restricted_roots: super::defaults::restricted_roots(),
            sensitive_patterns: super::defaults::sensitive_patterns(),
            working_root,
            target_path: None,
        }
    }

    /// 명령 검증용: 작업 루트(데이터)와 확장 디렉토리에 쓰기 허용
    pub fn for_command(
        working_root: impl Into<PathBuf>,
        extension_roots: &[PathBuf],
        source: IntentSource,
    ) -> Self {
        let mut ctx = Self::new(working_root).with_source(source);
        for root in extension_roots {
            ctx = ctx.with_writable_root(root);
        }
        ctx
    }

    /// 산출물 검증용: 확장 디렉토리에만 쓰기 허용, 출처는 self-extension
    pub fn for_artifact(
        working_root: impl Into<PathBuf>,
        extension_roots: &[PathBuf],
        target: impl Into<PathBuf>,
    ) -> Self {
        let mut ctx = Self::new(working_root).with_source(IntentSource::SelfExtension);
        ctx.writable_roots = extension_roots
            .iter()
            .map(|r| ctx.resolve(r))
            .collect();
        ctx.target_path = Some(target.into());
        ctx
    }

    pub fn with_source(mut self, source: IntentSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = self.resolve(&cwd.into());
        self
    }

    pub fn with_writable_root(mut self, root: impl AsRef<Path>) -> Self {
        let resolved = self.resolve(root.as_ref());
        if !self.writable_roots.contains(&resolved) {
            self.writable_roots.push(resolved);
        }
        self
    }

    pub fn with_restricted_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.restricted_roots = roots;
        self
    }

    // ========================================================================
    // 경로 판정
    // ========================================================================

    /// ~ 확장, cwd 기준 절대화, 어휘적 정규화 (파일 존재 여부와 무관)
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.resolve_from(&self.cwd, path)
    }

    /// `base` 기준으로 해석 (명령 안의 `cd` 이후 경로)
    pub fn resolve_from(&self, base: &Path, path: &Path) -> PathBuf {
        let expanded = expand_home(path);
        let absolute = if expanded.is_absolute() {
            expanded
        } else {
            base.join(expanded)
        };
        normalize(&absolute)
    }

    pub fn is_inside_working_root(&self, resolved: &Path) -> bool {
        is_harmless_device(resolved) || path_is_under(resolved, &self.working_root)
    }

    pub fn is_writable(&self, resolved: &Path) -> bool {
        is_harmless_device(resolved)
            || self
                .writable_roots
                .iter()
                .any(|root| path_is_under(resolved, root))
    }

    pub fn is_restricted(&self, resolved: &Path) -> bool {
        if is_harmless_device(resolved) {
            return false;
        }
        // 작업 루트를 품은 제한 루트 (/root/project 등)는 작업 루트 안에서는 적용하지 않는다
        let in_restricted_root = self.restricted_roots.iter().any(|root| {
            path_is_under(resolved, root)
                && !(path_is_under(&self.working_root, root)
                    && path_is_under(resolved, &self.working_root))
        });
        in_restricted_root
            || self
                .sensitive_patterns
                .iter()
                .any(|pattern| glob_matches(pattern, resolved))
    }
}

/// 출력 버리기용 장치 (/dev/null 등)는 경로 검사 대상이 아니다
fn is_harmless_device(path: &Path) -> bool {
    matches!(
        path.to_str(),
        Some("/dev/null") | Some("/dev/stdout") | Some("/dev/stderr") | Some("/dev/tty")
    )
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

/// `.`/`..`를 어휘적으로 정리 (루트 위로는 올라가지 않음)
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn glob_matches(pattern: &str, path: &Path) -> bool {
    let expanded = if let Some(rest) = pattern.strip_prefix("~/") {
        match dirs::home_dir() {
            Some(home) => home.join(rest).display().to_string(),
            None => return false,
        }
    } else {
        pattern.to_string()
    };

    glob::Pattern::new(&expanded)
        .map(|p| p.matches_path(path))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_and_traversal() {
        let ctx = PolicyContext::new("/work/project");
        assert_eq!(ctx.resolve(Path::new("src/main.rs")), PathBuf::from("/work/project/src/main.rs"));
        assert_eq!(ctx.resolve(Path::new("../../etc/passwd")), PathBuf::from("/etc/passwd"));
        assert!(!ctx.is_inside_working_root(&ctx.resolve(Path::new("../other"))));
        assert!(ctx.is_inside_working_root(&ctx.resolve(Path::new("./a/../b"))));
    }

    #[test]
    fn test_artifact_context_only_extension_roots_writable() {
        let roots = vec![PathBuf::from("/work/plugins"), PathBuf::from("/work/templates")];
        let ctx = PolicyContext::for_artifact("/work", &roots, "/work/plugins/docker.json");
        assert_eq!(ctx.source, IntentSource::SelfExtension);
        assert!(ctx.is_writable(Path::new("/work/plugins/docker.json")));
        assert!(!ctx.is_writable(Path::new("/work/docker.json")));
        assert!(ctx.is_writable(Path::new("/dev/null")));
    }

    #[test]
    fn test_restricted_paths() {
        let ctx = PolicyContext::new("/work");
        assert!(ctx.is_restricted(Path::new("/etc/hosts")));
        assert!(ctx.is_restricted(Path::new("/work/.env")));
        assert!(!ctx.is_restricted(Path::new("/work/notes.txt")));
    }

    #[test]
    fn test_working_root_inside_restricted_root() {
        let ctx = PolicyContext::new("/root/project");
        assert!(!ctx.is_restricted(Path::new("/root/project/out.txt")));
        assert!(ctx.is_restricted(Path::new("/root/.bashrc")));
        assert!(ctx.is_restricted(Path::new("/root/project/.env")));
    }
}
