//! Confirmer - confirm 판정에 대한 사용자 확인

use anvil_foundation::PolicyVerdict;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 확인 대상
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfirmPurpose {
    /// 명령 실행
    Execute,
    /// 합성된 capability 통합
    Integrate,
}

/// 확인 요청
#[derive(Debug, Clone)]
pub struct ConfirmRequest {
    pub purpose: ConfirmPurpose,

    /// 실행할 명령 또는 통합할 capability 이름
    pub subject: String,

    pub verdict: PolicyVerdict,

    /// 더 안전한 대안 명령 (있으면)
    pub safer_variant: Option<String>,
}

/// 사용자 확인 인터페이스
#[async_trait]
pub trait Confirmer: Send + Sync {
    /// 승인하면 true
    async fn confirm(&self, request: &ConfirmRequest) -> bool;
}

/// 항상 승인
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

#[async_trait]
impl Confirmer for AutoApprove {
    async fn confirm(&self, _request: &ConfirmRequest) -> bool {
        true
    }
}

/// 항상 거절 (비대화형 실행의 기본값)
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoDecline;

#[async_trait]
impl Confirmer for AutoDecline {
    async fn confirm(&self, _request: &ConfirmRequest) -> bool {
        false
    }
}
