//! LlmClient trait and common types

use crate::error::ProviderError;
use crate::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 요청별 생성 옵션 (None이면 클라이언트 설정값)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl CompletionOptions {
    pub fn with_system(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// LLM 완성 클라이언트
///
/// 네트워크 에러, rate limit, 잘못된 응답 모두 `ProviderError`로 반환되며
/// 상위 레이어에서는 `LlmUnavailable`로 구분된다.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 클라이언트 이름 (로그용)
    fn name(&self) -> &str;

    /// 모델 ID
    fn model(&self) -> &str;

    /// 사용 가능 여부 (API 키 등)
    fn is_available(&self) -> bool {
        true
    }

    /// prompt + history → 텍스트
    async fn complete_with(
        &self,
        prompt: &str,
        history: &[Message],
        options: &CompletionOptions,
    ) -> Result<String, ProviderError>;

    /// 기본 옵션으로 완성
    async fn complete(&self, prompt: &str, history: &[Message]) -> Result<String, ProviderError> {
        self.complete_with(prompt, history, &CompletionOptions::default())
            .await
    }
}
