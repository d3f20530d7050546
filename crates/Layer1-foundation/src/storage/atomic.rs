//! 원자적 파일 쓰기

use std::io;
use std::path::{Path, PathBuf};

/// 같은 디렉토리의 임시 파일 경로 (`.<name>.tmp`)
pub fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}

/// 임시 파일에 쓴 뒤 rename
///
/// 같은 파일 시스템 안의 rename이므로 독자는 이전 내용 또는 새 내용만 본다.
/// 실패하면 임시 파일을 지우고 원본은 그대로 둔다.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = temp_sibling(path);
    if let Err(e) = std::fs::write(&tmp, data).and_then(|_| std::fs::rename(&tmp, path)) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}
