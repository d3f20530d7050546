//! LLM client implementations
//!
//! - `openai`: OpenAI 호환 HTTP API (chutes, vLLM, OpenAI 등)
//! - `scripted`: 미리 정한 응답을 순서대로 돌려주는 오프라인 클라이언트

pub mod openai;
pub mod scripted;
