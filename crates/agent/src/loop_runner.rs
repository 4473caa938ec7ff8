//! The agent reasoning loop implementation.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use parley_core::{
    ChatExecutor, Error, Event, EventBus, ExecutorRequest, Message, MessageTransform,
    PipelinePoint, Result, RunContext, RunId, ToolCall, ToolRegistry, TransformPipeline,
};
use tracing::{debug, info, warn};

use crate::dispatcher::ToolDispatcher;

/// Input of one agent run.
#[derive(Debug, Clone, Default)]
pub struct RunInput {
    /// Seed conversation
    pub messages: Vec<Message>,

    /// Tools offered to the model. `None` makes the run a single turn.
    pub tools: Option<Arc<ToolRegistry>>,

    /// Overrides the loop's default system prompt
    pub system_prompt: Option<String>,

    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl RunInput {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub run_id: RunId,

    /// The last message of `response_messages`
    pub response_message: Message,

    /// Every message the run produced, after post-run transforms
    pub response_messages: Vec<Message>,

    /// Number of executor calls made
    pub turns: u32,
}

/// The core agent loop that alternates model turns and tool dispatch.
///
/// A loop is reusable: it holds no per-run state, so one instance may serve
/// many concurrent runs.
pub struct AgentLoop {
    /// The model backend
    executor: Arc<dyn ChatExecutor>,

    dispatcher: ToolDispatcher,

    transforms: TransformPipeline,

    /// Event bus for run events
    events: Arc<EventBus>,

    /// Used when a run supplies no system prompt
    system_prompt: Option<String>,
}

impl AgentLoop {
    /// Create a loop publishing on the process-wide event bus.
    pub fn new(executor: Arc<dyn ChatExecutor>) -> Self {
        let events = EventBus::global();
        Self {
            executor,
            dispatcher: ToolDispatcher::new(Arc::clone(&events)),
            transforms: TransformPipeline::new(),
            events,
            system_prompt: None,
        }
    }

    /// Publish on `events` instead of the process-wide bus.
    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.dispatcher = ToolDispatcher::new(Arc::clone(&events));
        self.events = events;
        self
    }

    /// Set the default system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Append a transform to the set at `point`.
    pub fn with_transform(
        mut self,
        point: PipelinePoint,
        transform: impl MessageTransform + 'static,
    ) -> Self {
        self.transforms.register(point, Arc::new(transform));
        self
    }

    /// Replace the whole transform pipeline.
    pub fn with_transforms(mut self, transforms: TransformPipeline) -> Self {
        self.transforms = transforms;
        self
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn model_id(&self) -> &str {
        self.executor.model_id()
    }

    /// Run the conversation in `input` to completion.
    ///
    /// Each turn calls the executor, applies the pre-tool-call transforms and
    /// appends the response to the output. When tools were given and the
    /// response requests any, the calls are dispatched, their results appended,
    /// and the post-tool-call transforms decide what the next turn sees. The
    /// loop ends on the first turn without tool calls; there is no turn limit.
    ///
    /// Executor and transform failures abort the run, as does a tool call
    /// message carrying no calls. Tool failures never do.
    pub async fn run(&self, input: RunInput) -> Result<RunOutput> {
        let RunInput {
            messages,
            tools,
            system_prompt,
            metadata,
        } = input;
        let system_prompt = system_prompt.or_else(|| self.system_prompt.clone());
        let mut context = RunContext::new(self.executor.model_id(), messages, metadata);
        let definitions = tools.as_ref().map(|t| t.definitions());

        info!(
            run_id = %context.run_id,
            model = %context.model_id,
            messages = context.messages.len(),
            tools = definitions.as_ref().map_or(0, Vec::len),
            "Starting agent run"
        );
        let run_start = Instant::now();
        self.events.emit(&Event::RunStart {
            context: &context,
            messages: &context.messages,
            system_prompt: system_prompt.as_deref(),
            model_id: &context.model_id,
        });

        let mut output: Vec<Message> = Vec::new();
        let mut turns = 0u32;

        loop {
            turns += 1;
            debug!(
                run_id = %context.run_id,
                turn = turns,
                messages = context.messages.len(),
                "Agent loop turn"
            );

            self.events.emit(&Event::TurnStart {
                context: &context,
                messages: &context.messages,
                system_prompt: system_prompt.as_deref(),
                model_id: &context.model_id,
            });
            let turn_start = Instant::now();

            let response = self
                .executor
                .execute(ExecutorRequest {
                    messages: &context.messages,
                    tools: definitions.as_deref(),
                    system_prompt: system_prompt.as_deref(),
                    context: &context,
                    events: self.events.as_ref(),
                })
                .await
                .inspect_err(|e| warn!(run_id = %context.run_id, error = %e, "Executor failed"))?;

            let response = self
                .transforms
                .apply(PipelinePoint::PreToolCall, response.messages)
                .await?;
            if response
                .iter()
                .any(|m| m.tool_calls().is_some_and(<[ToolCall]>::is_empty))
            {
                warn!(run_id = %context.run_id, turn = turns, "Tool call message with no calls");
                return Err(Error::EmptyToolCall {
                    run_id: context.run_id,
                });
            }

            self.events.emit(&Event::TurnEnd {
                context: &context,
                messages: &response,
                model_id: &context.model_id,
                elapsed: turn_start.elapsed(),
            });
            output.extend(response.iter().cloned());

            let registry = match &tools {
                Some(registry) if response.iter().any(Message::is_tool_call) => registry,
                _ => {
                    context.messages.extend(response);
                    break;
                }
            };

            let results = self.dispatch_all(&response, registry, &context).await;
            output.extend(results.iter().cloned());

            let mut combined = response;
            combined.extend(results);
            let combined = self
                .transforms
                .apply(PipelinePoint::PostToolCall, combined)
                .await?;
            context.messages.extend(combined);
        }

        let output = self.transforms.apply(PipelinePoint::PostRun, output).await?;
        let Some(response_message) = output.last().cloned() else {
            warn!(run_id = %context.run_id, "Run produced no messages");
            return Err(Error::EmptyRun {
                run_id: context.run_id,
            });
        };

        let elapsed = run_start.elapsed();
        self.events.emit(&Event::RunEnd {
            context: &context,
            messages: &output,
            model_id: &context.model_id,
            elapsed,
        });
        info!(
            run_id = %context.run_id,
            turns,
            messages = output.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Agent run finished"
        );

        Ok(RunOutput {
            run_id: context.run_id,
            response_message,
            response_messages: output,
            turns,
        })
    }

    /// Dispatch every tool-call message of a response, all concurrently.
    async fn dispatch_all(
        &self,
        response: &[Message],
        tools: &ToolRegistry,
        context: &RunContext,
    ) -> Vec<Message> {
        let tool_calls: Vec<Message> = response
            .iter()
            .filter(|m| m.is_tool_call())
            .cloned()
            .collect();

        self.events.emit(&Event::ToolsStart {
            context,
            tool_calls: &tool_calls,
        });
        let start = Instant::now();

        let batches = join_all(
            tool_calls
                .iter()
                .map(|message| self.dispatcher.dispatch(message, tools, context)),
        )
        .await;
        let results: Vec<Message> = batches.into_iter().flatten().collect();

        debug!(
            run_id = %context.run_id,
            results = results.len(),
            "Tool calls settled"
        );
        self.events.emit(&Event::ToolsEnd {
            context,
            results: &results,
            elapsed: start.elapsed(),
        });
        results
    }
}

impl std::fmt::Debug for AgentLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentLoop")
            .field("model_id", &self.executor.model_id())
            .field("transforms", &self.transforms)
            .field("system_prompt", &self.system_prompt)
            .finish()
    }
}
