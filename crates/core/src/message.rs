//! Message protocol shared by every component.
//!
//! A conversation is a list of [`Message`]s. The executor produces them, the
//! dispatcher answers tool calls with them, and transforms rewrite lists of
//! them between turns. The set of variants is closed: consumers match on it
//! exhaustively instead of branching on a role string.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role tag of a message, as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// System instructions
    System,
    /// The end user
    User,
    /// Natural-language model output
    Assistant,
    /// A model turn requesting tool invocations
    ToolCall,
    /// A tool's answer to one call
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::ToolCall => "tool_call",
            Role::Tool => "tool",
        };
        f.write_str(s)
    }
}

/// Outcome of a single tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Error,
}

/// A model-issued request to invoke a named tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID, echoed back by the matching tool result
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// The model's best-effort payload, not yet validated
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Create a call with a fresh `call_<uuid>` id.
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: format!("call_{}", Uuid::new_v4()),
            name: name.into(),
            arguments,
        }
    }

    /// Create a call with an id chosen by the caller (usually the backend's).
    pub fn with_id(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    /// Instruction text.
    System {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },

    /// End-user input.
    User {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },

    /// Model-generated text.
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },

    /// One model turn requesting one or more tool invocations.
    ToolCall { tool_calls: Vec<ToolCall> },

    /// The dispatcher's answer to exactly one [`ToolCall`].
    #[serde(rename = "tool")]
    ToolResult {
        content: String,
        /// Name of the tool that was called
        name: String,
        tool_call_id: String,
        status: ToolStatus,
    },
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
            name: None,
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
            name: None,
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            name: None,
        }
    }

    /// Create a tool-call message.
    ///
    /// An empty `tool_calls` is representable but is a protocol violation:
    /// the agent loop rejects it with [`Error::EmptyToolCall`](crate::Error::EmptyToolCall).
    pub fn tool_call(tool_calls: Vec<ToolCall>) -> Self {
        Self::ToolCall { tool_calls }
    }

    /// Create a tool result answering `tool_call_id`.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
        status: ToolStatus,
    ) -> Self {
        Self::ToolResult {
            content: content.into(),
            name: name.into(),
            tool_call_id: tool_call_id.into(),
            status,
        }
    }

    /// Attach an actor name. No-op for tool-call and tool-result messages,
    /// whose names are fixed by the call.
    pub fn with_name(mut self, actor: impl Into<String>) -> Self {
        match &mut self {
            Self::System { name, .. } | Self::User { name, .. } | Self::Assistant { name, .. } => {
                *name = Some(actor.into());
            }
            Self::ToolCall { .. } | Self::ToolResult { .. } => {}
        }
        self
    }

    pub fn role(&self) -> Role {
        match self {
            Self::System { .. } => Role::System,
            Self::User { .. } => Role::User,
            Self::Assistant { .. } => Role::Assistant,
            Self::ToolCall { .. } => Role::ToolCall,
            Self::ToolResult { .. } => Role::Tool,
        }
    }

    /// Text content, if this variant carries any.
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::System { content, .. }
            | Self::User { content, .. }
            | Self::Assistant { content, .. }
            | Self::ToolResult { content, .. } => Some(content),
            Self::ToolCall { .. } => None,
        }
    }

    pub fn is_tool_call(&self) -> bool {
        matches!(self, Self::ToolCall { .. })
    }

    /// The requested calls of a tool-call message.
    pub fn tool_calls(&self) -> Option<&[ToolCall]> {
        match self {
            Self::ToolCall { tool_calls } => Some(tool_calls),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, agent!");
        assert_eq!(msg.role(), Role::User);
        assert_eq!(msg.content(), Some("Hello, agent!"));
        assert!(!msg.is_tool_call());
    }

    #[test]
    fn serializes_with_role_tag() {
        let msg = Message::tool_result("call_1", "CalculatorTool", "7", ToolStatus::Success);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_1");
        assert_eq!(json["status"], "success");

        let call = Message::tool_call(vec![ToolCall::with_id(
            "call_2",
            "CalculatorTool",
            serde_json::json!({"expr": "1 + 1"}),
        )]);
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["role"], "tool_call");
        assert_eq!(json["tool_calls"][0]["arguments"]["expr"], "1 + 1");
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = serde_json::from_str::<Message>(r#"{"role":"narrator","content":"hi"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn parses_assistant_without_name() {
        let msg: Message = serde_json::from_str(r#"{"role":"assistant","content":"hi"}"#).unwrap();
        assert_eq!(msg, Message::assistant("hi"));
    }

    #[test]
    fn with_name_only_touches_text_roles() {
        let named = Message::user("hey").with_name("jon");
        assert!(matches!(named, Message::User { name: Some(ref n), .. } if n == "jon"));

        let calls = vec![ToolCall::with_id("call_1", "CalculatorTool", serde_json::Value::Null)];
        let call = Message::tool_call(calls.clone()).with_name("ignored");
        assert_eq!(call, Message::tool_call(calls));
    }

    #[test]
    fn fresh_call_ids_are_unique() {
        let a = ToolCall::new("x", serde_json::Value::Null);
        let b = ToolCall::new("x", serde_json::Value::Null);
        assert!(a.id.starts_with("call_"));
        assert_ne!(a.id, b.id);
    }
}
