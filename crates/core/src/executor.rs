//! Chat executor trait: the model execution port.
//!
//! A ChatExecutor knows how to send a conversation to one model backend and
//! turn the reply into protocol [`Message`]s. Vendor request shaping, auth,
//! and transport all live behind this trait; the agent loop only sees
//! messages in and messages out.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::RunContext;
use crate::error::ExecutorError;
use crate::event::EventBus;
use crate::message::Message;
use crate::tool::ToolDefinition;

/// One turn's input to an executor.
#[derive(Debug, Clone, Copy)]
pub struct ExecutorRequest<'a> {
    /// The conversation so far
    pub messages: &'a [Message],

    /// Tools the model may call this run, `None` when the run has no tools
    pub tools: Option<&'a [ToolDefinition]>,

    pub system_prompt: Option<&'a str>,

    pub context: &'a RunContext,

    /// Bus for `RawRequest` / `RawResponse` events
    pub events: &'a EventBus,
}

/// A complete (non-streaming) response from an executor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutorResponse {
    /// Response messages, in the order the backend produced them
    pub messages: Vec<Message>,

    /// Token usage statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ExecutorResponse {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            usage: None,
        }
    }

    /// The last response message.
    pub fn response_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// Token usage information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core ChatExecutor trait.
///
/// Implementations must return at least one message per call; an empty
/// response is a contract violation that aborts the run.
#[async_trait]
pub trait ChatExecutor: Send + Sync {
    /// The backend-specific id of the model this executor calls.
    fn model_id(&self) -> &str;

    /// Run one model turn.
    async fn execute(
        &self,
        request: ExecutorRequest<'_>,
    ) -> Result<ExecutorResponse, ExecutorError>;
}
