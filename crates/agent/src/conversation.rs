use crate::llm::ChatMessage;

/// The model is a front desk, not a decision maker: it answers from the tools
/// or asks for clarification.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant working for a company providing \
courses. You can answer normally to any general question. You also have access to tools \
(functions) and should call them directly when appropriate. One tool can help you find \
information about the visitor (lead) if they share their name, email or phone number. Another \
tool retrieves the list of available courses. The third tool retrieves the price of a course by \
its name. Do not ask the user for confirmation. If a function is useful to fulfill the request, \
call it immediately. Don't make assumptions about what values to plug into functions. Ask for \
clarification if a user request is ambiguous.";

/// Full message history for one assistant session, system prompt first.
#[derive(Clone, Debug)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self { messages: vec![ChatMessage::system(SYSTEM_PROMPT)] }
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::Conversation;
    use crate::llm::{ChatMessage, Role};

    #[test]
    fn conversation_starts_with_the_system_prompt() {
        let conversation = Conversation::new();
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.messages()[0].role, Role::System);
    }

    #[test]
    fn pushed_messages_keep_their_order() {
        let mut conversation = Conversation::new();
        conversation.push(ChatMessage::user("hola"));
        conversation.push(ChatMessage::assistant("buenos días"));

        let roles: Vec<_> = conversation.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles.len(), 3);
        assert_eq!(conversation.messages()[1].text(), Some("hola"));
    }
}
