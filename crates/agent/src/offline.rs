//! Executors that need no model backend.
//!
//! [`EchoExecutor`] answers from a few fixed rules and [`ScriptedExecutor`]
//! replays recorded turns. Both drive the full loop, tools included, which
//! makes them useful for demos, tests, and checking configuration offline.

use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use async_trait::async_trait;
use parley_core::{
    ChatExecutor, Event, ExecutorError, ExecutorRequest, ExecutorResponse, Message, ToolCall,
    Usage,
};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// Rule-based executor.
///
/// Looks only at the last message of the conversation:
/// - a user message `Calculate <expr>`, when `CalculatorTool` is offered,
///   becomes a call to that tool;
/// - any other user message is echoed back as `You said: <text>`;
/// - a tool result is reported as `The <tool> tool said: <content>`;
/// - anything else gets `Hello`.
#[derive(Debug, Clone)]
pub struct EchoExecutor {
    model_id: String,
}

impl EchoExecutor {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
        }
    }

    fn reply(&self, request: &ExecutorRequest<'_>) -> Message {
        let calculator_offered = request
            .tools
            .is_some_and(|tools| tools.iter().any(|t| t.name == "CalculatorTool"));

        match request.messages.last() {
            Some(Message::User { content, .. }) => match content.strip_prefix("Calculate ") {
                Some(expr) if calculator_offered => Message::tool_call(vec![ToolCall::new(
                    "CalculatorTool",
                    json!({ "expr": expr }),
                )]),
                _ => Message::assistant(format!("You said: {content}")),
            },
            Some(Message::ToolResult { name, content, .. }) => {
                Message::assistant(format!("The {name} tool said: {content}"))
            }
            _ => Message::assistant("Hello"),
        }
    }
}

impl Default for EchoExecutor {
    fn default() -> Self {
        Self::new("echo-1")
    }
}

#[async_trait]
impl ChatExecutor for EchoExecutor {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn execute(
        &self,
        request: ExecutorRequest<'_>,
    ) -> Result<ExecutorResponse, ExecutorError> {
        let raw_request = json!({
            "model": self.model_id,
            "system": request.system_prompt,
            "messages": request.messages,
            "tools": request.tools,
        });
        request.events.emit(&Event::RawRequest {
            context: request.context,
            model_id: &self.model_id,
            request: &raw_request,
        });
        let start = Instant::now();

        let reply = self.reply(&request);
        let prompt_tokens = request
            .messages
            .iter()
            .filter_map(Message::content)
            .map(|c| c.split_whitespace().count() as u32)
            .sum::<u32>();
        let completion_tokens = reply.content().map_or(0, |c| c.split_whitespace().count() as u32);

        let raw_response = json!({ "message": &reply });
        request.events.emit(&Event::RawResponse {
            context: request.context,
            model_id: &self.model_id,
            response: &raw_response,
            elapsed: start.elapsed(),
        });

        Ok(ExecutorResponse {
            messages: vec![reply],
            usage: Some(Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }),
        })
    }
}

/// On-disk form of a script.
#[derive(Debug, Deserialize)]
struct Script {
    model_id: String,
    turns: Vec<Vec<Message>>,
}

/// Replays a fixed sequence of responses, one per turn.
///
/// Running past the end of the script is an [`ExecutorError::InvalidResponse`].
#[derive(Debug)]
pub struct ScriptedExecutor {
    model_id: String,
    turns: Vec<Vec<Message>>,
    call_count: Mutex<usize>,
}

impl ScriptedExecutor {
    pub fn from_turns(model_id: impl Into<String>, turns: Vec<Vec<Message>>) -> Self {
        Self {
            model_id: model_id.into(),
            turns,
            call_count: Mutex::new(0),
        }
    }

    /// Load a JSON script of the form
    /// `{"model_id": "...", "turns": [[<message>, ...], ...]}`.
    pub fn from_file(path: &Path) -> Result<Self, ExecutorError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ExecutorError::NotConfigured(format!("cannot read script {}: {e}", path.display()))
        })?;
        let script: Script = serde_json::from_str(&content).map_err(|e| {
            ExecutorError::NotConfigured(format!("invalid script {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), turns = script.turns.len(), "Loaded executor script");
        Ok(Self::from_turns(script.model_id, script.turns))
    }

    /// Number of turns served so far.
    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ChatExecutor for ScriptedExecutor {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn execute(
        &self,
        _request: ExecutorRequest<'_>,
    ) -> Result<ExecutorResponse, ExecutorError> {
        let mut count = self.call_count.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(messages) = self.turns.get(*count) else {
            return Err(ExecutorError::InvalidResponse(format!(
                "script exhausted after {} turns",
                self.turns.len()
            )));
        };
        *count += 1;
        Ok(ExecutorResponse::new(messages.clone()))
    }
}
