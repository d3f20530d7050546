//! # anvil-provider
//!
//! LLM completion client layer for Anvil.
//!
//! ## Features
//! - `LlmClient`: `complete(prompt, history) -> text` 단일 인터페이스
//! - OpenAI 호환 Chat Completions 클라이언트
//! - 지수 백오프 재시도 (취소 가능)
//! - 모든 실패는 `LlmUnavailable`로 합쳐져 상위 레이어에 전달

pub mod error;
pub mod message;
pub mod providers;
pub mod retry;
pub mod r#trait;

// Core trait and types
pub use message::{render_transcript, Message, MessageRole};
pub use r#trait::{CompletionOptions, LlmClient};

// Error and retry
pub use error::ProviderError;
pub use retry::{with_retry, RetryConfig, RetryHint};

// Client implementations
pub use providers::openai::OpenAiCompatClient;
pub use providers::scripted::ScriptedClient;
