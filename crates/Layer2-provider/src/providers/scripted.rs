//! ScriptedClient - 오프라인 응답 클라이언트
//!
//! API 키 없이 파이프라인을 돌리거나 테스트에서 LLM 응답을 고정할 때 쓴다.

use crate::{
    error::ProviderError,
    r#trait::{CompletionOptions, LlmClient},
    Message,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// 미리 넣어둔 응답을 순서대로 반환
///
/// 큐가 비면 `fallback`을 반환하고, fallback도 없으면 `Network` 에러.
#[derive(Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    fallback: Option<Result<String, ProviderError>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 항상 실패하는 클라이언트 (LLM 미가용)
    pub fn unavailable() -> Self {
        Self::new().with_fallback(Err(ProviderError::Network(
            "connection refused".to_string(),
        )))
    }

    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.replies.lock().push_back(Ok(reply.into()));
        self
    }

    pub fn with_error(self, error: ProviderError) -> Self {
        self.replies.lock().push_back(Err(error));
        self
    }

    pub fn with_fallback(mut self, fallback: Result<String, ProviderError>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.replies.lock().push_back(Ok(reply.into()));
    }

    /// 지금까지 받은 프롬프트
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete_with(
        &self,
        prompt: &str,
        _history: &[Message],
        _options: &CompletionOptions,
    ) -> Result<String, ProviderError> {
        self.prompts.lock().push(prompt.to_string());
        if let Some(reply) = self.replies.lock().pop_front() {
            return reply;
        }
        match &self.fallback {
            Some(fallback) => fallback.clone(),
            None => Err(ProviderError::Network("no scripted reply left".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replies_in_order() {
        let client = ScriptedClient::new().with_reply("first").with_reply("second");
        assert_eq!(client.complete("a", &[]).await.unwrap(), "first");
        assert_eq!(client.complete("b", &[]).await.unwrap(), "second");
        assert!(client.complete("c", &[]).await.is_err());
        assert_eq!(client.prompts(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_unavailable() {
        let client = ScriptedClient::unavailable();
        for _ in 0..3 {
            assert!(matches!(
                client.complete("x", &[]).await,
                Err(ProviderError::Network(_))
            ));
        }
    }
}
