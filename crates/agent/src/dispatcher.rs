//! Tool dispatcher: resolves, validates, and runs the calls of one
//! tool-call message.
//!
//! Every call yields exactly one tool result carrying the call's id, in call
//! order, however the call ends. Failures are folded into `error` results and
//! never surface as an `Err`.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use futures::future::join_all;
use parley_core::event::panic_message;
use parley_core::{Event, EventBus, Message, RunContext, Tool, ToolCall, ToolError, ToolRegistry, ToolStatus};
use tracing::{debug, warn};

/// Runs tool calls against a [`ToolRegistry`] and reports them on an [`EventBus`].
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    events: Arc<EventBus>,
}

impl ToolDispatcher {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self { events }
    }

    /// Dispatch every call of a tool-call message. Any other message yields
    /// no results.
    pub async fn dispatch(
        &self,
        message: &Message,
        tools: &ToolRegistry,
        context: &RunContext,
    ) -> Vec<Message> {
        match message.tool_calls() {
            Some(calls) => self.dispatch_calls(calls, tools, context).await,
            None => Vec::new(),
        }
    }

    /// Run `calls` concurrently and return their results in call order.
    pub async fn dispatch_calls(
        &self,
        calls: &[ToolCall],
        tools: &ToolRegistry,
        context: &RunContext,
    ) -> Vec<Message> {
        debug!(run_id = %context.run_id, count = calls.len(), "Dispatching tool calls");
        join_all(calls.iter().map(|call| self.dispatch_one(call, tools, context))).await
    }

    async fn dispatch_one(
        &self,
        call: &ToolCall,
        tools: &ToolRegistry,
        context: &RunContext,
    ) -> Message {
        let Some(tool) = tools.get(&call.name) else {
            warn!(run_id = %context.run_id, tool = %call.name, tool_call_id = %call.id, "Tool not found");
            let error = ToolError::NotFound(call.name.clone());
            return Message::tool_result(&call.id, &call.name, error.to_string(), ToolStatus::Error);
        };

        self.events.emit(&Event::ToolStart {
            context,
            tool_call: call,
        });
        let start = Instant::now();
        let outcome = invoke(tool.as_ref(), call, context).await;
        let elapsed = start.elapsed();

        let (result, error) = match outcome {
            Ok(text) => {
                debug!(tool = %call.name, tool_call_id = %call.id, elapsed_ms = elapsed.as_millis() as u64, "Tool succeeded");
                (
                    Message::tool_result(&call.id, &call.name, text, ToolStatus::Success),
                    None,
                )
            }
            Err(e) => {
                warn!(tool = %call.name, tool_call_id = %call.id, error = %e, "Tool failed");
                let content = match &e {
                    ToolError::InvalidArguments { .. } => e.to_string(),
                    other => format!("Error in tool {}: {other}", call.name),
                };
                (
                    Message::tool_result(&call.id, &call.name, content, ToolStatus::Error),
                    Some(e),
                )
            }
        };

        self.events.emit(&Event::ToolEnd {
            context,
            result: &result,
            error: error.as_ref(),
            elapsed,
        });
        result
    }
}

/// Validate then execute, turning a panic anywhere in the tool into an error.
async fn invoke(tool: &dyn Tool, call: &ToolCall, context: &RunContext) -> Result<String, ToolError> {
    let run = async {
        tool.validate(&call.arguments)?;
        tool.execute(call.arguments.clone(), context).await
    };
    match AssertUnwindSafe(run).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(payload) => Err(ToolError::failed(&call.name, panic_message(payload.as_ref()))),
    }
}
