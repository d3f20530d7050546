//! # Capability Registry
//!
//! 설치된 capability (builtin / command / plugin / template / environment-def)의
//! 이름 → 레코드 매핑을 관리하는 단일 진실 공급원(single source of truth)
//!
//! ## 설계 원칙
//!
//! 1. **Single-writer, multiple-reader**: `parking_lot::RwLock`으로 세션 간 공유
//! 2. **No silent overwrite**: 같은 이름은 `replace` 플래그 없이는 등록 불가
//! 3. **Listing order**: 조회는 O(1) HashMap, 목록은 삽입 순서
//! 4. **Snapshot**: 세션 저장/복원용 직렬화 가능한 스냅샷
//!
//! ## 아키텍처
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              CapabilityRegistry              │
//! │  RwLock<Inner>                               │
//! │   ├─ records: HashMap<name, CapabilityRecord>│
//! │   └─ order:   Vec<name>  (listing order)     │
//! └──────────────────────────────────────────────┘
//!        ▲ register/remove          │ get/list
//!        │                          ▼
//!  IntegrationManager          GapDetector
//! ```

mod builtin;
mod capability;

pub use builtin::builtin_capabilities;
pub use capability::{CapabilityRegistry, RegistrySnapshot};
