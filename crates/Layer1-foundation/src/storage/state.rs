//! StateStore - 세션 상태 스냅샷 파일

use super::atomic::atomic_write;
use crate::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 단일 상태 파일 저장소
///
/// 저장은 항상 원자적이라 중간에 죽어도 이전 스냅샷이 남는다.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// 스냅샷 저장
    pub fn save<T: Serialize>(&self, state: &T) -> Result<()> {
        let content = serde_json::to_string_pretty(state)
            .map_err(|e| Error::Storage(format!("Failed to serialize state: {}", e)))?;
        atomic_write(&self.path, content.as_bytes()).map_err(|e| {
            Error::Storage(format!("Failed to write {}: {}", self.path.display(), e))
        })?;
        debug!("State saved to {}", self.path.display());
        Ok(())
    }

    /// 스냅샷 로드 (파일이 없으면 None)
    pub fn load<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            Error::Storage(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        match serde_json::from_str(&content) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                warn!("Corrupted state file {}: {}", self.path.display(), e);
                Err(Error::Storage(format!(
                    "Failed to parse {}: {}",
                    self.path.display(),
                    e
                )))
            }
        }
    }
}
