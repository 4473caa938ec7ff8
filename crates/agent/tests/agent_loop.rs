//! End-to-end tests for the agent loop: executor turns, tool dispatch,
//! transforms, and the events a run publishes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use parley_agent::{AgentLoop, EchoExecutor, InlineToolCallParser, RunInput, ScriptedExecutor, ToolCallFilter};
use parley_core::{
    ChatExecutor, Error, EventBus, EventName, ExecutorError, ExecutorRequest, ExecutorResponse,
    Message, PipelinePoint, RunContext, Tool, ToolCall, ToolError, ToolRegistry, ToolStatus,
    TransformError, MessageTransform, transform_fn,
};
use parley_tools::CalculatorTool;
use serde_json::{Value, json};

// ── Helpers ───────────────────────────────────────────────────────────────

/// Answers calculator requests with a fixed call id, then reports tool output.
struct MockExecutor;

#[async_trait]
impl ChatExecutor for MockExecutor {
    fn model_id(&self) -> &str {
        "mock-model-id"
    }

    async fn execute(
        &self,
        request: ExecutorRequest<'_>,
    ) -> Result<ExecutorResponse, ExecutorError> {
        let reply = match request.messages.last() {
            Some(Message::User { content, .. }) if content == "Calculate 3 + 4" => {
                Message::tool_call(vec![ToolCall::with_id(
                    "toolcall1",
                    "CalculatorTool",
                    json!({"expr": "3 + 4"}),
                )])
            }
            Some(Message::User { content, .. }) => Message::assistant(format!("You said: {content}")),
            Some(Message::ToolResult { name, content, .. }) => {
                Message::assistant(format!("The {name} tool said: {content}"))
            }
            _ => Message::assistant("Hello"),
        };
        Ok(ExecutorResponse::new(vec![reply]))
    }
}

struct FailingExecutor;

#[async_trait]
impl ChatExecutor for FailingExecutor {
    fn model_id(&self) -> &str {
        "failing"
    }

    async fn execute(
        &self,
        _request: ExecutorRequest<'_>,
    ) -> Result<ExecutorResponse, ExecutorError> {
        Err(ExecutorError::Network("connection reset".into()))
    }
}

/// Sleeps `delay_ms` before returning its `label`.
struct DelayTool;

#[async_trait]
impl Tool for DelayTool {
    fn name(&self) -> &str {
        "delay"
    }
    fn description(&self) -> &str {
        "Returns its label after a delay"
    }
    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "label": { "type": "string" },
                "delay_ms": { "type": "integer" }
            },
            "required": ["label", "delay_ms"]
        })
    }
    async fn execute(&self, arguments: Value, _context: &RunContext) -> Result<String, ToolError> {
        let delay = arguments["delay_ms"].as_u64().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(arguments["label"].as_str().unwrap_or_default().to_string())
    }
}

struct BoomTool;

#[async_trait]
impl Tool for BoomTool {
    fn name(&self) -> &str {
        "boom"
    }
    fn description(&self) -> &str {
        "Always rejects"
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object"})
    }
    async fn execute(&self, _arguments: Value, _context: &RunContext) -> Result<String, ToolError> {
        Err(ToolError::failed(self.name(), "boom"))
    }
}

/// Reads the caller's metadata.
struct WhoAmITool;

#[async_trait]
impl Tool for WhoAmITool {
    fn name(&self) -> &str {
        "whoami"
    }
    fn description(&self) -> &str {
        "Reports the user from run metadata"
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object"})
    }
    async fn execute(&self, _arguments: Value, context: &RunContext) -> Result<String, ToolError> {
        Ok(context
            .meta("user")
            .and_then(Value::as_str)
            .unwrap_or("anonymous")
            .to_string())
    }
}

struct RejectingTransform;

#[async_trait]
impl MessageTransform for RejectingTransform {
    fn name(&self) -> &str {
        "rejecting"
    }

    async fn transform(&self, _messages: Vec<Message>) -> Result<Vec<Message>, TransformError> {
        Err(TransformError::Failed {
            transform: "rejecting".into(),
            reason: "not today".into(),
        })
    }
}

fn calculator_tools() -> Arc<ToolRegistry> {
    Arc::new(ToolRegistry::new().with_tool(CalculatorTool))
}

fn agent(executor: impl ChatExecutor + 'static) -> AgentLoop {
    AgentLoop::new(Arc::new(executor)).with_event_bus(Arc::new(EventBus::new()))
}

fn record_events(agent: &AgentLoop) -> Arc<Mutex<Vec<EventName>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    agent
        .events()
        .subscribe_all(move |event| sink.lock().unwrap().push(event.name()));
    log
}

fn tool_result_parts(message: &Message) -> (&str, &str, &str, ToolStatus) {
    match message {
        Message::ToolResult {
            content,
            name,
            tool_call_id,
            status,
        } => (tool_call_id.as_str(), name.as_str(), content.as_str(), *status),
        other => panic!("expected tool result, got {other:?}"),
    }
}

// ── Scenarios ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn calculator_round_trip() {
    let agent = agent(MockExecutor);
    let input = RunInput::new(vec![Message::user("Calculate 3 + 4")]).with_tools(calculator_tools());

    let output = agent.run(input).await.unwrap();

    assert_eq!(output.turns, 2);
    assert_eq!(
        output.response_message,
        Message::assistant("The CalculatorTool tool said: 7")
    );
    assert_eq!(output.response_messages.len(), 3);
    assert_eq!(
        output.response_messages[0],
        Message::tool_call(vec![ToolCall::with_id(
            "toolcall1",
            "CalculatorTool",
            json!({"expr": "3 + 4"})
        )])
    );
    assert_eq!(
        tool_result_parts(&output.response_messages[1]),
        ("toolcall1", "CalculatorTool", "7", ToolStatus::Success)
    );
}

#[tokio::test]
async fn plain_reply_ends_after_one_turn() {
    let agent = agent(MockExecutor);
    let input = RunInput::new(vec![Message::user("Hey buddy")]).with_tools(calculator_tools());

    let output = agent.run(input).await.unwrap();

    assert_eq!(output.turns, 1);
    assert_eq!(output.response_messages.len(), 1);
    assert_eq!(output.response_message, Message::assistant("You said: Hey buddy"));
}

#[tokio::test]
async fn echo_executor_drives_the_same_scenario() {
    let agent = agent(EchoExecutor::default());
    let input = RunInput::new(vec![Message::user("Calculate 3 + 4")]).with_tools(calculator_tools());

    let output = agent.run(input).await.unwrap();

    assert_eq!(
        output.response_message.content(),
        Some("The CalculatorTool tool said: 7")
    );
}

#[tokio::test]
async fn events_follow_run_order() {
    let agent = agent(MockExecutor);
    let log = record_events(&agent);
    let input = RunInput::new(vec![Message::user("Calculate 3 + 4")]).with_tools(calculator_tools());

    agent.run(input).await.unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            EventName::RunStart,
            EventName::TurnStart,
            EventName::TurnEnd,
            EventName::ToolsStart,
            EventName::ToolStart,
            EventName::ToolEnd,
            EventName::ToolsEnd,
            EventName::TurnStart,
            EventName::TurnEnd,
            EventName::RunEnd,
        ]
    );
}

#[tokio::test]
async fn run_events_share_one_run_id() {
    let agent = agent(MockExecutor);
    let ids = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&ids);
    agent
        .events()
        .subscribe_all(move |event| sink.lock().unwrap().push(event.context().run_id.clone()));

    let output = agent
        .run(RunInput::new(vec![Message::user("Hey buddy")]))
        .await
        .unwrap();

    let ids = ids.lock().unwrap();
    assert_eq!(ids.len(), 4);
    assert!(ids.iter().all(|id| *id == output.run_id));
}

#[tokio::test]
async fn panicking_listener_does_not_break_the_run() {
    let agent = agent(MockExecutor);
    agent
        .events()
        .subscribe(EventName::TurnStart, |_| panic!("listener bug"));
    let log = record_events(&agent);

    let output = agent
        .run(RunInput::new(vec![Message::user("Hey buddy")]))
        .await
        .unwrap();

    assert_eq!(output.response_message, Message::assistant("You said: Hey buddy"));
    assert_eq!(log.lock().unwrap().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn results_keep_call_order_when_later_calls_finish_first() {
    let executor = ScriptedExecutor::from_turns(
        "scripted",
        vec![
            vec![Message::tool_call(vec![
                ToolCall::with_id("slow", "delay", json!({"label": "first", "delay_ms": 300})),
                ToolCall::with_id("fast", "delay", json!({"label": "second", "delay_ms": 5})),
                ToolCall::with_id("mid", "delay", json!({"label": "third", "delay_ms": 50})),
            ])],
            vec![Message::assistant("done")],
        ],
    );
    let agent = agent(executor);
    let tools = Arc::new(ToolRegistry::new().with_tool(DelayTool));

    let output = agent
        .run(RunInput::new(vec![Message::user("go")]).with_tools(tools))
        .await
        .unwrap();

    let results: Vec<_> = output.response_messages[1..4]
        .iter()
        .map(|m| {
            let (id, _, content, _) = tool_result_parts(m);
            (id.to_string(), content.to_string())
        })
        .collect();
    assert_eq!(
        results,
        vec![
            ("slow".to_string(), "first".to_string()),
            ("fast".to_string(), "second".to_string()),
            ("mid".to_string(), "third".to_string()),
        ]
    );
}

#[tokio::test]
async fn tool_failures_are_folded_into_the_conversation() {
    let executor = ScriptedExecutor::from_turns(
        "scripted",
        vec![
            vec![Message::tool_call(vec![
                ToolCall::with_id("a", "missing_tool", json!({})),
                ToolCall::with_id("b", "boom", json!({})),
                ToolCall::with_id("c", "CalculatorTool", json!({"expr": 34})),
                ToolCall::with_id("d", "CalculatorTool", json!({"expr": "2 * 21"})),
            ])],
            vec![Message::assistant("recovered")],
        ],
    );
    let agent = agent(executor);
    let tools = Arc::new(
        ToolRegistry::new()
            .with_tool(BoomTool)
            .with_tool(CalculatorTool),
    );

    let output = agent
        .run(RunInput::new(vec![Message::user("go")]).with_tools(tools))
        .await
        .unwrap();

    let results: Vec<_> = output.response_messages[1..5]
        .iter()
        .map(tool_result_parts)
        .collect();

    assert_eq!(results[0].0, "a");
    assert_eq!(results[0].3, ToolStatus::Error);
    assert!(results[0].2.contains("missing_tool"));

    assert_eq!(results[1].0, "b");
    assert_eq!(results[1].3, ToolStatus::Error);
    assert!(results[1].2.contains("boom"));

    assert_eq!(results[2].3, ToolStatus::Error);
    assert!(results[2].2.starts_with("Invalid parameters for tool CalculatorTool"));

    assert_eq!(results[3], ("d", "CalculatorTool", "42", ToolStatus::Success));
    assert_eq!(output.response_message, Message::assistant("recovered"));
}

#[tokio::test]
async fn tool_calls_without_tools_end_the_run() {
    let executor = ScriptedExecutor::from_turns(
        "scripted",
        vec![vec![Message::tool_call(vec![ToolCall::new("CalculatorTool", json!({"expr": "1"}))])]],
    );
    let agent = agent(executor);

    let output = agent
        .run(RunInput::new(vec![Message::user("go")]))
        .await
        .unwrap();

    assert_eq!(output.turns, 1);
    assert!(output.response_message.is_tool_call());
}

#[tokio::test]
async fn tools_receive_run_metadata() {
    let executor = ScriptedExecutor::from_turns(
        "scripted",
        vec![
            vec![Message::tool_call(vec![ToolCall::with_id("w", "whoami", json!({}))])],
            vec![Message::assistant("ok")],
        ],
    );
    let agent = agent(executor);
    let input = RunInput::new(vec![Message::user("who am I?")])
        .with_tools(Arc::new(ToolRegistry::new().with_tool(WhoAmITool)))
        .with_metadata("user", json!("ada"));

    let output = agent.run(input).await.unwrap();

    assert_eq!(output.response_messages[1].content(), Some("ada"));
}

// ── Failures ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn executor_errors_abort_the_run() {
    let agent = agent(FailingExecutor);
    let log = record_events(&agent);

    let err = agent
        .run(RunInput::new(vec![Message::user("hi")]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Executor(ExecutorError::Network(_))));
    assert!(!log.lock().unwrap().contains(&EventName::RunEnd));
}

#[tokio::test]
async fn transform_errors_abort_the_run() {
    let agent = agent(MockExecutor).with_transform(PipelinePoint::PostRun, RejectingTransform);

    let err = agent
        .run(RunInput::new(vec![Message::user("hi")]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Transform(_)));
}

#[tokio::test]
async fn empty_output_is_an_error() {
    let agent = agent(ScriptedExecutor::from_turns("scripted", vec![vec![]]));

    let err = agent
        .run(RunInput::new(vec![Message::user("hi")]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::EmptyRun { .. }));
}

#[tokio::test]
async fn tool_call_without_calls_is_rejected() {
    let executor = ScriptedExecutor::from_turns(
        "scripted",
        vec![
            vec![Message::tool_call(vec![])],
            vec![Message::assistant("unreachable")],
        ],
    );
    let agent = agent(executor);
    let events = record_events(&agent);

    let err = agent
        .run(RunInput::new(vec![Message::user("go")]).with_tools(calculator_tools()))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::EmptyToolCall { .. }));
    let events = events.lock().unwrap();
    assert!(!events.contains(&EventName::ToolsStart));
    assert!(!events.contains(&EventName::RunEnd));
}

#[tokio::test]
async fn deeply_nested_expression_fails_alone() {
    let deep = format!("{}1{}", "(".repeat(20_000), ")".repeat(20_000));
    let executor = ScriptedExecutor::from_turns(
        "scripted",
        vec![
            vec![Message::tool_call(vec![
                ToolCall::with_id("deep", "CalculatorTool", json!({"expr": deep})),
                ToolCall::with_id("easy", "CalculatorTool", json!({"expr": "1 + 1"})),
            ])],
            vec![Message::assistant("done")],
        ],
    );
    let agent = agent(executor);

    let output = agent
        .run(RunInput::new(vec![Message::user("go")]).with_tools(calculator_tools()))
        .await
        .unwrap();

    let (id, _, content, status) = tool_result_parts(&output.response_messages[1]);
    assert_eq!(id, "deep");
    assert_eq!(status, ToolStatus::Error);
    assert!(content.contains(parley_tools::calculator::INVALID_EXPRESSION));

    let (id, _, content, status) = tool_result_parts(&output.response_messages[2]);
    assert_eq!(id, "easy");
    assert_eq!(status, ToolStatus::Success);
    assert_eq!(content, "2");
    assert_eq!(output.response_message, Message::assistant("done"));
}

#[tokio::test]
async fn exhausted_script_is_an_executor_error() {
    let executor = ScriptedExecutor::from_turns(
        "scripted",
        vec![vec![Message::tool_call(vec![ToolCall::new("CalculatorTool", json!({"expr": "1"}))])]],
    );
    let agent = agent(executor);

    let err = agent
        .run(RunInput::new(vec![Message::user("go")]).with_tools(calculator_tools()))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Executor(ExecutorError::InvalidResponse(_))));
}

// ── Transforms ────────────────────────────────────────────────────────────

#[tokio::test]
async fn pre_tool_transforms_shape_the_turn() {
    let executor = ScriptedExecutor::from_turns(
        "scripted",
        vec![
            vec![Message::assistant(
                "Let me calculate.\n[{\"name\": \"CalculatorTool\", \"arguments\": {\"expr\": \"3 + 4\"}}]",
            )],
            vec![Message::assistant("It is 7.")],
        ],
    );
    let agent = agent(executor)
        .with_transform(PipelinePoint::PreToolCall, InlineToolCallParser::new())
        .with_transform(PipelinePoint::PreToolCall, ToolCallFilter::new());

    let output = agent
        .run(RunInput::new(vec![Message::user("3 + 4?")]).with_tools(calculator_tools()))
        .await
        .unwrap();

    assert_eq!(output.response_messages.len(), 3);
    let call = &output.response_messages[0].tool_calls().unwrap()[0];
    assert_eq!(call.name, "CalculatorTool");
    let (id, _, content, status) = tool_result_parts(&output.response_messages[1]);
    assert_eq!(id, call.id);
    assert_eq!((content, status), ("7", ToolStatus::Success));
}

#[tokio::test]
async fn post_tool_transforms_shape_the_next_turn_only() {
    // Hides tool traffic from the model but not from the caller.
    let agent = agent(MockExecutor).with_transform(
        PipelinePoint::PostToolCall,
        transform_fn("summarize_tools", |messages: Vec<Message>| {
            messages
                .into_iter()
                .filter_map(|m| match m {
                    Message::ToolResult { content, .. } => Some(Message::user(format!("Result: {content}"))),
                    _ => None,
                })
                .collect()
        }),
    );

    let output = agent
        .run(RunInput::new(vec![Message::user("Calculate 3 + 4")]).with_tools(calculator_tools()))
        .await
        .unwrap();

    assert_eq!(output.response_message, Message::assistant("You said: Result: 7"));
    assert!(output.response_messages[0].is_tool_call());
}

#[tokio::test]
async fn post_run_transforms_see_the_whole_output_once() {
    let calls = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&calls);
    let agent = agent(MockExecutor).with_transform(
        PipelinePoint::PostRun,
        transform_fn("final_only", move |mut messages: Vec<Message>| {
            *counter.lock().unwrap() += 1;
            messages.pop().into_iter().collect()
        }),
    );

    let output = agent
        .run(RunInput::new(vec![Message::user("Calculate 3 + 4")]).with_tools(calculator_tools()))
        .await
        .unwrap();

    assert_eq!(*calls.lock().unwrap(), 1);
    assert_eq!(
        output.response_messages,
        vec![Message::assistant("The CalculatorTool tool said: 7")]
    );
}
