use anyhow::Result;
use serde_json::Value;
use tracing::{debug, warn};

use crate::conversation::Conversation;
use crate::llm::{ChatMessage, LlmClient};
use crate::tools::{prototype_registry, ToolRegistry};

const NO_RESPONSE: &str = "No response.";

/// Drives one assistant session: forward the history to the model, run any
/// tool calls it makes, feed the results back, and return the final text.
pub struct AssistantRuntime<C> {
    llm: C,
    tools: ToolRegistry,
    conversation: Conversation,
}

impl<C> AssistantRuntime<C>
where
    C: LlmClient,
{
    pub fn new(llm: C, tools: ToolRegistry) -> Self {
        Self { llm, tools, conversation: Conversation::new() }
    }

    pub fn with_prototype_tools(llm: C) -> Self {
        Self::new(llm, prototype_registry())
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub async fn handle_message(&mut self, text: &str) -> Result<String> {
        self.conversation.push(ChatMessage::user(text));

        let specs = self.tools.specs();
        let response = self.llm.chat(self.conversation.messages(), &specs).await?;

        if let Some(content) = response.text() {
            let content = content.to_string();
            self.conversation.push(ChatMessage::assistant(content.clone()));
            return Ok(content);
        }

        if response.tool_calls.is_empty() {
            return Ok(NO_RESPONSE.to_string());
        }

        let calls = response.tool_calls.clone();
        self.conversation.push(response);

        for call in calls {
            let Some(tool) = self.tools.get(&call.function.name) else {
                // the model hallucinated a name; drop the call rather than
                // fail the turn
                warn!(
                    event_name = "assistant.unknown_tool",
                    tool = %call.function.name,
                    "model requested an unregistered tool"
                );
                continue;
            };

            let arguments: Value =
                serde_json::from_str(&call.function.arguments).unwrap_or(Value::Null);
            let result = match tool.execute(arguments).await {
                Ok(result) => result,
                Err(tool_error) => {
                    warn!(
                        event_name = "assistant.tool_failed",
                        tool = %call.function.name,
                        error = %tool_error,
                        "tool execution failed"
                    );
                    serde_json::json!({"error": tool_error.to_string()})
                }
            };

            debug!(
                event_name = "assistant.tool_executed",
                tool = %call.function.name,
                "tool result appended to conversation"
            );
            self.conversation.push(ChatMessage::tool_result(
                &call.id,
                &call.function.name,
                result.to_string(),
            ));
        }

        // follow-up completion sees the tool results but gets no tools,
        // matching the single-round dispatch the prototype needs
        let followup = self.llm.chat(self.conversation.messages(), &[]).await?;
        let content = followup.text().unwrap_or(NO_RESPONSE).to_string();
        self.conversation.push(ChatMessage::assistant(content.clone()));
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::AssistantRuntime;
    use crate::llm::{ChatMessage, LlmError, LlmClient, Role, ToolCall, ToolCallFunction, ToolSpec};

    /// Replays a fixed sequence of model turns.
    struct ScriptedLlm {
        turns: Mutex<Vec<ChatMessage>>,
        tool_visible_turns: Mutex<Vec<usize>>,
    }

    impl ScriptedLlm {
        fn new(mut turns: Vec<ChatMessage>) -> Self {
            turns.reverse();
            Self { turns: Mutex::new(turns), tool_visible_turns: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            tools: &[ToolSpec],
        ) -> Result<ChatMessage, LlmError> {
            self.tool_visible_turns.lock().expect("lock").push(tools.len());
            self.turns.lock().expect("lock").pop().ok_or(LlmError::EmptyResponse)
        }
    }

    fn tool_call(id: &str, name: &str, arguments: &str) -> ChatMessage {
        ChatMessage {
            role: Role::Assistant,
            content: None,
            tool_calls: vec![ToolCall {
                id: id.to_string(),
                call_type: "function".to_string(),
                function: ToolCallFunction {
                    name: name.to_string(),
                    arguments: arguments.to_string(),
                },
            }],
            tool_call_id: None,
            name: None,
        }
    }

    #[tokio::test]
    async fn plain_answer_is_returned_and_recorded() {
        let llm = ScriptedLlm::new(vec![ChatMessage::assistant("Buenos días, ¿en qué ayudo?")]);
        let mut runtime = AssistantRuntime::with_prototype_tools(llm);

        let reply = runtime.handle_message("hola").await.expect("handle message");
        assert_eq!(reply, "Buenos días, ¿en qué ayudo?");
        // system + user + assistant
        assert_eq!(runtime.conversation().len(), 3);
    }

    #[tokio::test]
    async fn tool_call_is_executed_and_result_feeds_the_followup() {
        let llm = ScriptedLlm::new(vec![
            tool_call("call-1", "retrieve_prices", r#"{"course_name":"Salud"}"#),
            ChatMessage::assistant("El curso de Salud cuesta 200€."),
        ]);
        let mut runtime = AssistantRuntime::with_prototype_tools(llm);

        let reply = runtime.handle_message("¿cuánto cuesta Salud?").await.expect("handle message");
        assert_eq!(reply, "El curso de Salud cuesta 200€.");

        let messages = runtime.conversation().messages();
        // system, user, assistant(tool_calls), tool, assistant
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[3].role, Role::Tool);
        assert!(messages[3].content.as_deref().expect("tool content").contains("200€"));
    }

    #[tokio::test]
    async fn followup_completion_runs_without_tools() {
        let llm = ScriptedLlm::new(vec![
            tool_call("call-1", "retrieve_courses", "{}"),
            ChatMessage::assistant("Ofrecemos Salud, Electricidad y Hostelería."),
        ]);
        let mut runtime = AssistantRuntime::with_prototype_tools(llm);
        runtime.handle_message("¿qué cursos hay?").await.expect("handle message");

        let llm = runtime.llm;
        let visible = llm.tool_visible_turns.lock().expect("lock").clone();
        assert_eq!(visible, vec![3, 0]);
    }

    #[tokio::test]
    async fn unknown_tool_is_skipped_without_failing_the_turn() {
        let llm = ScriptedLlm::new(vec![
            tool_call("call-1", "retrieve_refunds", "{}"),
            ChatMessage::assistant("No tengo esa información."),
        ]);
        let mut runtime = AssistantRuntime::with_prototype_tools(llm);

        let reply = runtime.handle_message("devuélveme el dinero").await.expect("handle message");
        assert_eq!(reply, "No tengo esa información.");

        // no tool message was appended for the unknown call
        let messages = runtime.conversation().messages();
        assert!(messages.iter().all(|message| message.role != Role::Tool));
    }

    #[tokio::test]
    async fn empty_model_turn_yields_the_fallback_reply() {
        let llm = ScriptedLlm::new(vec![ChatMessage {
            role: Role::Assistant,
            content: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }]);
        let mut runtime = AssistantRuntime::with_prototype_tools(llm);

        let reply = runtime.handle_message("…").await.expect("handle message");
        assert_eq!(reply, "No response.");
    }
}
