//! Message types for LLM communication

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    /// 명령 실행 출력
    Tool,
}

impl MessageRole {
    /// Chat Completions API 역할 이름 (tool 출력은 user로 보낸다)
    pub fn api_role(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User | MessageRole::Tool => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    /// 평문 프롬프트용 접두어
    pub fn prefix(&self) -> &'static str {
        match self {
            MessageRole::System => "System: ",
            MessageRole::User => "User: ",
            MessageRole::Assistant => "Assistant: ",
            MessageRole::Tool => "Tool Output: ",
        }
    }
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: Uuid,

    /// Role of this message
    pub role: MessageRole,

    /// Text content
    pub content: String,

    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Create a tool output message
    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Tool, content)
    }
}

/// 대화 기록을 평문 프롬프트로 변환 (마지막에 `Assistant: ` 접두어)
pub fn render_transcript(history: &[Message]) -> String {
    let mut parts: Vec<String> = history
        .iter()
        .map(|m| format!("{}{}", m.role.prefix(), m.content))
        .collect();
    parts.push(MessageRole::Assistant.prefix().to_string());
    parts.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_role_maps_to_user() {
        assert_eq!(MessageRole::Tool.api_role(), "user");
        assert_eq!(MessageRole::Assistant.api_role(), "assistant");
    }

    #[test]
    fn test_render_transcript() {
        let history = vec![Message::user("list files"), Message::tool("a.txt\nb.txt")];
        let text = render_transcript(&history);
        assert!(text.starts_with("User: list files"));
        assert!(text.contains("Tool Output: a.txt"));
        assert!(text.ends_with("Assistant: "));
    }
}
