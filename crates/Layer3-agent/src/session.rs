//! Session state - 재시작 후에도 자기 확장 결과를 복구하기 위한 상태 blob

use crate::history::ConversationHistory;
use crate::memory::AgentMemory;
use anvil_core::RegistrySnapshot;
use anvil_foundation::{Result, StateStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 현재 상태 형식 버전
pub const SESSION_STATE_VERSION: u32 = 1;

/// 저장되는 세션 상태
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub history: ConversationHistory,
    /// Capability Registry 전체 스냅샷
    pub registry: RegistrySnapshot,
    #[serde(default)]
    pub memory: AgentMemory,
}

impl SessionState {
    pub fn new(history: ConversationHistory, registry: RegistrySnapshot, memory: AgentMemory) -> Self {
        Self {
            version: SESSION_STATE_VERSION,
            saved_at: Utc::now(),
            history,
            registry,
            memory,
        }
    }
}

/// 상태 파일 저장소 (원자적 저장)
#[derive(Debug, Clone)]
pub struct SessionStore {
    store: StateStore,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            store: StateStore::new(path),
        }
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    pub fn save(&self, state: &SessionState) -> Result<()> {
        self.store.save(state)?;
        debug!(
            "Saved session state ({} messages, {} capabilities) to {}",
            state.history.len(),
            state.registry.len(),
            self.path().display()
        );
        Ok(())
    }

    /// 저장된 상태 (파일이 없으면 None)
    pub fn load(&self) -> Result<Option<SessionState>> {
        let state: Option<SessionState> = self.store.load()?;
        if let Some(state) = &state {
            info!(
                "Loaded session state v{} saved at {}",
                state.version, state.saved_at
            );
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_core::CapabilityRegistry;

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("state.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("nested/state.json"));

        let mut history = ConversationHistory::new();
        history.add_user("ls");
        let state = SessionState::new(
            history,
            CapabilityRegistry::with_builtins().snapshot(),
            AgentMemory::new(),
        );

        store.save(&state).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, state);
    }
}
