//! 산출물 파일 쓰기 추상화

use anvil_foundation::atomic_write;
use std::io;
use std::path::Path;

/// 확장 디렉토리에 대한 파일 연산
///
/// Integration Manager만 이 trait을 통해 확장 디렉토리에 쓴다.
pub trait ArtifactWriter: Send + Sync {
    /// 원자적 쓰기 (실패 시 대상 파일은 이전 상태 유지)
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// 로컬 파일 시스템 구현
#[derive(Debug, Default, Clone, Copy)]
pub struct FsWriter;

impl ArtifactWriter for FsWriter {
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        atomic_write(path, contents)
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }
}
