//! `--events`: log every run event.

use parley_core::{Event, EventBus, SubscriptionId};
use tracing::info;

/// Subscribe a logger for every event on `bus`.
pub fn log_events(bus: &EventBus) -> SubscriptionId {
    bus.subscribe_all(|event| {
        let context = event.context();
        let elapsed_ms = event.elapsed().map(|d| d.as_millis() as u64);
        info!(
            event = %event.name(),
            run_id = %context.run_id,
            elapsed_ms,
            "{}",
            summarize(event)
        );
    })
}

/// One-line description of an event's payload.
pub fn summarize(event: &Event<'_>) -> String {
    match event {
        Event::RunStart { messages, model_id, .. } => {
            format!("run started on {model_id} with {} messages", messages.len())
        }
        Event::RunEnd { messages, .. } => format!("run produced {} messages", messages.len()),
        Event::TurnStart { messages, .. } => format!("sending {} messages", messages.len()),
        Event::TurnEnd { messages, .. } => format!("received {} messages", messages.len()),
        Event::ToolsStart { tool_calls, .. } => {
            let count: usize = tool_calls
                .iter()
                .filter_map(|m| m.tool_calls())
                .map(<[_]>::len)
                .sum();
            format!("dispatching {count} tool calls")
        }
        Event::ToolsEnd { results, .. } => format!("{} tool results", results.len()),
        Event::ToolStart { tool_call, .. } => {
            format!("calling {} ({}) with {}", tool_call.name, tool_call.id, tool_call.arguments)
        }
        Event::ToolEnd { result, error, .. } => match error {
            Some(e) => format!("tool failed: {e}"),
            None => format!("tool returned: {}", result.content().unwrap_or_default()),
        },
        Event::RawRequest { model_id, .. } => format!("raw request to {model_id}"),
        Event::RawResponse { model_id, .. } => format!("raw response from {model_id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::{Message, RunContext, ToolCall, ToolError, ToolStatus};
    use std::time::Duration;

    #[test]
    fn summarizes_tool_events() {
        let context = RunContext::new("m", vec![], serde_json::Map::new());
        let call = ToolCall::with_id("c1", "CalculatorTool", serde_json::json!({"expr": "1+1"}));
        let start = Event::ToolStart {
            context: &context,
            tool_call: &call,
        };
        assert_eq!(
            summarize(&start),
            r#"calling CalculatorTool (c1) with {"expr":"1+1"}"#
        );

        let result = Message::tool_result("c1", "CalculatorTool", "2", ToolStatus::Success);
        let end = Event::ToolEnd {
            context: &context,
            result: &result,
            error: None,
            elapsed: Duration::from_millis(3),
        };
        assert_eq!(summarize(&end), "tool returned: 2");

        let error = ToolError::failed("CalculatorTool", "bad");
        let failed = Event::ToolEnd {
            context: &context,
            result: &result,
            error: Some(&error),
            elapsed: Duration::ZERO,
        };
        assert_eq!(summarize(&failed), "tool failed: bad");
    }

    #[test]
    fn logger_subscribes_to_everything() {
        let bus = EventBus::new();
        let id = log_events(&bus);
        assert_eq!(bus.listener_count(parley_core::EventName::RawResponse), 1);
        assert!(bus.unsubscribe(id));
    }
}
