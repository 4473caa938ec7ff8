//! Builds an agent from configuration, shared by `chat` and `ask`.

use std::sync::Arc;
use std::time::Duration;

use parley_agent::{
    AgentLoop, EchoExecutor, InlineToolCallParser, RunInput, RunOutput, ScriptedExecutor,
    ToolCallFilter, render_tool_prompt,
};
use parley_config::{AppConfig, ExecutorKind};
use parley_core::{ChatExecutor, Message, PipelinePoint, ToolRegistry};
use tracing::debug;

pub struct Runtime {
    agent: AgentLoop,
    tools: Option<Arc<ToolRegistry>>,
    timeout: Option<Duration>,
}

impl Runtime {
    pub fn from_config(config: &AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let executor: Arc<dyn ChatExecutor> = match config.executor {
            ExecutorKind::Echo => Arc::new(EchoExecutor::new(&config.model_id)),
            ExecutorKind::Scripted => {
                let path = config
                    .script_path
                    .as_deref()
                    .ok_or("executor 'scripted' requires script_path")?;
                Arc::new(ScriptedExecutor::from_file(path)?)
            }
        };

        let registry = parley_tools::registry_with(&config.tools.enabled);
        let tools = (!registry.is_empty()).then(|| Arc::new(registry));

        let mut agent = AgentLoop::new(executor);

        // Backends that need inline calls learn the format from the prompt.
        let tool_prompt = match &tools {
            Some(tools) if config.transforms.inline_tool_calls => Some(render_tool_prompt(tools)),
            _ => None,
        };
        let system_prompt = match (config.system_prompt.as_deref(), tool_prompt) {
            (Some(prompt), Some(tools)) => Some(format!("{prompt}\n\n{tools}")),
            (Some(prompt), None) => Some(prompt.to_string()),
            (None, tools) => tools,
        };
        if let Some(prompt) = system_prompt {
            agent = agent.with_system_prompt(prompt);
        }

        if config.transforms.inline_tool_calls {
            agent = agent.with_transform(PipelinePoint::PreToolCall, InlineToolCallParser::new());
        }
        if config.transforms.tool_call_filter {
            agent = agent.with_transform(PipelinePoint::PreToolCall, ToolCallFilter::new());
        }

        debug!(
            executor = %config.executor,
            model = agent.model_id(),
            tools = tools.as_ref().map_or(0, |t| t.len()),
            "Runtime ready"
        );

        Ok(Self {
            agent,
            tools,
            timeout: config.run_timeout_secs.map(Duration::from_secs),
        })
    }

    pub fn model_id(&self) -> &str {
        self.agent.model_id()
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.as_ref().map_or_else(Vec::new, |t| t.names())
    }

    /// Run one conversation, bounded by the configured timeout.
    pub async fn run(&self, messages: Vec<Message>) -> Result<RunOutput, Box<dyn std::error::Error>> {
        let mut input = RunInput::new(messages);
        if let Some(tools) = &self.tools {
            input = input.with_tools(Arc::clone(tools));
        }

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.agent.run(input))
                .await
                .map_err(|_| format!("Run timed out after {}s", limit.as_secs()))??,
            None => self.agent.run(input).await?,
        };
        Ok(output)
    }
}
