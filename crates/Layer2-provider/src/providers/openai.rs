//! OpenAI 호환 Chat Completions 클라이언트

use crate::{
    error::ProviderError,
    r#trait::{CompletionOptions, LlmClient},
    retry::{with_retry, RetryConfig},
    Message,
};
use anvil_foundation::LlmSettings;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// OpenAI 호환 API 클라이언트 (chutes, vLLM, LocalAI, OpenAI 등)
pub struct OpenAiCompatClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    timeout_secs: u64,
    retry: RetryConfig,
    cancel: CancellationToken,
}

impl OpenAiCompatClient {
    /// 설정으로부터 생성
    pub fn from_settings(settings: &LlmSettings) -> Result<Self, ProviderError> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ProviderError::NotConfigured("API key is missing".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: settings.api_host.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            top_p: settings.top_p,
            timeout_secs: settings.timeout_secs,
            retry: RetryConfig::default(),
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// 재시도 대기를 끊을 토큰
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_request(
        &self,
        prompt: &str,
        history: &[Message],
        options: &CompletionOptions,
    ) -> ChatRequest {
        let mut messages = Vec::with_capacity(history.len() + 2);

        if let Some(system) = &options.system_prompt {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        for msg in history {
            messages.push(ChatMessage {
                role: msg.role.api_role().to_string(),
                content: msg.content.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: options.temperature.unwrap_or(self.temperature),
            max_tokens: options.max_tokens.unwrap_or(self.max_tokens),
            top_p: self.top_p,
            stream: false,
        }
    }

    async fn send_once(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(&e, self.timeout_secs))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(parse_error_response(status.as_u16(), &body));
        }

        let api_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        extract_content(api_response)
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn complete_with(
        &self,
        prompt: &str,
        history: &[Message],
        options: &CompletionOptions,
    ) -> Result<String, ProviderError> {
        let request = self.build_request(prompt, history, options);
        debug!(
            "Sending completion request to {} ({} messages)",
            self.endpoint(),
            request.messages.len()
        );
        with_retry(&self.retry, "llm.complete", &self.cancel, || {
            self.send_once(&request)
        })
        .await
    }
}

/// 에러 응답 본문 해석
fn parse_error_response(status: u16, body: &str) -> ProviderError {
    if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(body) {
        let error = error_response.error;
        return match error.code.as_deref() {
            Some("rate_limit_exceeded") => ProviderError::RateLimited {
                retry_after_ms: None,
            },
            Some("invalid_api_key") => ProviderError::Authentication(error.message),
            Some("model_not_found") => ProviderError::ModelNotFound(error.message),
            _ => ProviderError::from_http_status(status, &error.message),
        };
    }
    ProviderError::from_http_status(status, body)
}

/// 첫 번째 choice의 텍스트
fn extract_content(response: ChatResponse) -> Result<String, ProviderError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".to_string()))?;

    match choice.message.content {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(ProviderError::InvalidResponse(
            "Empty completion content".to_string(),
        )),
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> LlmSettings {
        LlmSettings {
            api_key: Some("sk-test".to_string()),
            api_host: "http://localhost:9/v1/".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_requires_api_key() {
        let err = OpenAiCompatClient::from_settings(&LlmSettings::default())
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[test]
    fn test_build_request() {
        let client = OpenAiCompatClient::from_settings(&settings()).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:9/v1/chat/completions");

        let history = vec![Message::user("hi"), Message::tool("output")];
        let options = CompletionOptions::default()
            .with_system("You are a shell assistant")
            .with_temperature(0.1);
        let request = client.build_request("list files", &history, &options);

        let roles: Vec<&str> = request.messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "user", "user"]);
        assert_eq!(request.messages.last().unwrap().content, "list files");
        assert!((request.temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(request.max_tokens, 1024);
    }

    #[test]
    fn test_parse_error_response() {
        let body = r#"{"error":{"message":"bad key","code":"invalid_api_key"}}"#;
        assert_eq!(
            parse_error_response(401, body),
            ProviderError::Authentication("bad key".to_string())
        );
        assert!(matches!(
            parse_error_response(502, "<html>bad gateway</html>"),
            ProviderError::ServerError(_)
        ));
    }

    #[test]
    fn test_extract_content() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"ls -la"}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_content(response).unwrap(), "ls -la");

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(
            extract_content(empty),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let client = OpenAiCompatClient::from_settings(&settings())
            .unwrap()
            .with_retry_config(RetryConfig::single_attempt());
        let err = client.complete("hello", &[]).await.unwrap_err();
        assert!(matches!(
            err,
            ProviderError::Network(_) | ProviderError::Timeout(_)
        ));
    }
}
