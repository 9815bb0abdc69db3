use super::client::{Message, Role};

#[derive(Debug, Clone, PartialEq)]
struct ChatHistory {
    inner: Vec<Message>,
}
impl ChatHistory {
    fn with_system(content: &str) -> Self {
        Self {
            inner: vec![Message::new(Role::System, content)],
        }
    }
    fn all(&self) -> &[Message] {
        &self.inner
    }
    fn len(&self) -> usize {
        self.inner.len()
    }
    fn push_request(&mut self, message: impl Into<String>) {
        self.inner.push(Message::new(Role::User, message));
    }
    fn push_response(&mut self, message: impl Into<String>) {
        self.inner.push(Message::new(Role::Assistant, message));
    }
}

/// Owns the transcript sent with every completion request.
///
/// The first message is always the system persona. Each turn adds one user
/// message followed by exactly one assistant message.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSession {
    history: ChatHistory,
}
impl ConversationSession {
    pub const SYSTEM_PERSONA: &'static str = "I am a helpful assistant.";
    pub fn new() -> Self {
        Self {
            history: ChatHistory::with_system(Self::SYSTEM_PERSONA),
        }
    }
    /// Swaps in a fresh transcript holding only the system message.
    pub fn reset(&mut self) {
        self.history = ChatHistory::with_system(Self::SYSTEM_PERSONA);
    }
    pub fn append_user(&mut self, text: impl Into<String>) {
        debug_assert!(
            self.awaiting_user(),
            "user message appended before the previous turn was answered"
        );
        self.history.push_request(text);
    }
    pub fn append_assistant(&mut self, text: impl Into<String>) {
        debug_assert!(
            !self.awaiting_user(),
            "assistant message appended without a pending user message"
        );
        self.history.push_response(text);
    }
    pub fn render(&self) -> &[Message] {
        self.history.all()
    }
    pub fn len(&self) -> usize {
        self.history.len()
    }
    pub fn is_empty(&self) -> bool {
        self.history.len() == 0
    }
    fn awaiting_user(&self) -> bool {
        self.history
            .all()
            .last()
            .map_or(true, |m| m.role() != Role::User)
    }
}
impl Default for ConversationSession {
    fn default() -> Self {
        Self::new()
    }
}
