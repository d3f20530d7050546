//! Conversation history

use anvil_provider::{Message, MessageRole};
use serde::{Deserialize, Serialize};

/// 대화 기록
///
/// 실행 결과는 Outcome Analyzer가 소비한 뒤 tool 메시지로 이곳에 들어온다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationHistory {
    /// Messages in order
    messages: Vec<Message>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    pub fn add_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message::assistant(content));
    }

    /// 실행 결과 기록
    pub fn add_tool(&mut self, command: &str, output: &str) {
        self.messages
            .push(Message::tool(format!("Command: {}\n\nResult:\n{}", command, output)));
    }

    pub fn add(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// 마지막 `n`개 메시지 (LLM 호출용)
    pub fn recent(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn last_user(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
    }
}
