//! Storage - 파일 기반 저장소
//!
//! - `atomic`: 임시 파일 + rename 원자적 쓰기
//! - `state`: 세션 상태 스냅샷 (save/load)

mod atomic;
mod state;

pub use atomic::{atomic_write, temp_sibling};
pub use state::StateStore;
