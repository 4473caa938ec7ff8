use async_trait::async_trait;
use parley_core::{Message, MessageTransform, TransformError};

/// Drops everything but the tool calls from a response that contains any.
///
/// Some backends send an assistant preamble ("Let me check that...") along
/// with their tool calls. Registered before tool dispatch, this keeps only
/// the calls; a response without tool calls passes through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolCallFilter;

impl ToolCallFilter {
    pub fn new() -> Self {
        Self
    }

    pub fn apply(&self, messages: Vec<Message>) -> Vec<Message> {
        if messages.iter().any(Message::is_tool_call) {
            messages.into_iter().filter(Message::is_tool_call).collect()
        } else {
            messages
        }
    }
}

#[async_trait]
impl MessageTransform for ToolCallFilter {
    fn name(&self) -> &str {
        "tool_call_filter"
    }

    async fn transform(&self, messages: Vec<Message>) -> Result<Vec<Message>, TransformError> {
        Ok(self.apply(messages))
    }
}
