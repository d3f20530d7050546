//! CapabilityRegistry - 이름 기반 capability 카탈로그

use super::builtin::builtin_capabilities;
use anvil_foundation::{CapabilityKind, CapabilityRecord, CapabilityStatus, Error, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

// ============================================================================
// RegistrySnapshot - 직렬화 가능한 스냅샷
// ============================================================================

/// 레지스트리 스냅샷 - 특정 시점의 레코드 목록 (삽입 순서 유지)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// 스냅샷 생성 시간
    pub created_at: DateTime<Utc>,

    /// 저장된 레코드들
    pub records: Vec<CapabilityRecord>,
}

impl RegistrySnapshot {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.name.as_str()).collect()
    }
}

// ============================================================================
// CapabilityRegistry
// ============================================================================

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<String, CapabilityRecord>,
    order: Vec<String>,
}

/// Capability 레지스트리 - Interior Mutability로 `Arc` 공유 상태에서 변경 가능
///
/// 여기에 없는 capability는 백업 파일이 디스크에 있어도 사용할 수 없다.
#[derive(Debug)]
pub struct CapabilityRegistry {
    inner: RwLock<Inner>,

    /// 레지스트리 이름 (디버깅용)
    name: String,
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityRegistry {
    /// 빈 레지스트리 생성
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            name: "capabilities".to_string(),
        }
    }

    /// 기본 builtin이 등록된 레지스트리
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        {
            let mut inner = registry.inner.write();
            for record in builtin_capabilities() {
                inner.order.push(record.name.clone());
                inner.records.insert(record.name.clone(), record);
            }
        }
        debug!("[{}] Loaded {} builtins", registry.name, registry.len());
        registry
    }

    // ========================================================================
    // 등록 / 해제
    // ========================================================================

    /// 레코드 등록
    ///
    /// 같은 이름이 있고 `replace`가 false면 `DuplicateCapability`.
    /// 교체 시 목록상의 위치는 유지된다.
    pub fn register(&self, record: CapabilityRecord, replace: bool) -> Result<()> {
        let mut inner = self.inner.write();
        let name = record.name.clone();

        if let Some(existing) = inner.records.get(&name) {
            if !replace {
                warn!(
                    "[{}] '{}' already registered ({} v{}), use replace",
                    self.name, name, existing.kind, existing.version
                );
                return Err(Error::DuplicateCapability(name));
            }
            info!(
                "[{}] Replaced: {} (v{} -> v{})",
                self.name, name, existing.version, record.version
            );
        } else {
            inner.order.push(name.clone());
            debug!("[{}] Registered: {} ({}, {})", self.name, name, record.kind, record.status);
        }

        inner.records.insert(name, record);
        Ok(())
    }

    /// 레코드 제거
    pub fn remove(&self, name: &str) -> Option<CapabilityRecord> {
        let mut inner = self.inner.write();
        let removed = inner.records.remove(name);
        if removed.is_some() {
            inner.order.retain(|n| n != name);
            debug!("[{}] Removed: {}", self.name, name);
        }
        removed
    }

    /// 상태 전환 (pending-validation → active 등)
    pub fn set_status(&self, name: &str, status: CapabilityStatus) -> Result<()> {
        let mut inner = self.inner.write();
        let record = inner
            .records
            .get_mut(name)
            .ok_or_else(|| Error::CapabilityNotFound(name.to_string()))?;
        debug!("[{}] {}: {} -> {}", self.name, name, record.status, status);
        record.status = status;
        Ok(())
    }

    // ========================================================================
    // 조회
    // ========================================================================

    /// 이름으로 조회 (O(1))
    pub fn get(&self, name: &str) -> Option<CapabilityRecord> {
        self.inner.read().records.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().records.contains_key(name)
    }

    /// 삽입 순서 목록 (kind 필터 옵션)
    pub fn list(&self, kind: Option<CapabilityKind>) -> Vec<CapabilityRecord> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|name| inner.records.get(name))
            .filter(|r| kind.map_or(true, |k| r.kind == k))
            .cloned()
            .collect()
    }

    /// active 레코드만 (삽입 순서)
    pub fn active(&self) -> Vec<CapabilityRecord> {
        self.list(None).into_iter().filter(|r| r.is_active()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 종류별 개수
    pub fn count_by_kind(&self) -> Vec<(CapabilityKind, usize)> {
        let records = self.list(None);
        let mut kinds = vec![CapabilityKind::Builtin];
        kinds.extend(CapabilityKind::EXTENSIONS);
        kinds
            .into_iter()
            .map(|kind| (kind, records.iter().filter(|r| r.kind == kind).count()))
            .filter(|(_, count)| *count > 0)
            .collect()
    }

    // ========================================================================
    // 스냅샷
    // ========================================================================

    /// 현재 상태 스냅샷
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            created_at: Utc::now(),
            records: self.list(None),
        }
    }

    /// 스냅샷으로 전체 교체
    pub fn restore(&self, snapshot: &RegistrySnapshot) {
        let mut inner = self.inner.write();
        inner.records.clear();
        inner.order.clear();
        for record in &snapshot.records {
            if inner.records.insert(record.name.clone(), record.clone()).is_none() {
                inner.order.push(record.name.clone());
            }
        }
        info!("[{}] Restored {} records", self.name, inner.records.len());
    }

    /// 스냅샷으로 교체한 뒤 빠진 builtin을 뒤에 채워 넣는다
    ///
    /// 저장 이후 추가된 builtin도 여기서 들어온다. 채워 넣은 수를 돌려준다.
    pub fn restore_with_builtins(&self, snapshot: &RegistrySnapshot) -> usize {
        self.restore(snapshot);
        let mut added = 0;
        for builtin in builtin_capabilities() {
            if self.contains(&builtin.name) {
                continue;
            }
            match self.register(builtin, false) {
                Ok(()) => added += 1,
                Err(e) => warn!("[{}] Failed to re-add builtin: {}", self.name, e),
            }
        }
        added
    }
}
