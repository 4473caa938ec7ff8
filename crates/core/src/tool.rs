//! Tool trait: the abstraction over agent capabilities.
//!
//! A tool has a unique name, a description for the model, a JSON Schema
//! describing its arguments, and an async handler that turns validated
//! arguments into text.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::context::RunContext;
use crate::error::ToolError;

/// A tool definition advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// The core Tool trait.
///
/// Tools are constructed once and shared across runs, so implementations
/// should not keep per-run state.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "CalculatorTool").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Check arguments before [`execute`](Tool::execute) is called.
    ///
    /// The default validates against [`parameters_schema`](Tool::parameters_schema).
    fn validate(&self, arguments: &serde_json::Value) -> Result<(), ToolError> {
        validate_against_schema(self.name(), &self.parameters_schema(), arguments)
    }

    /// Execute the tool with validated arguments.
    async fn execute(
        &self,
        arguments: serde_json::Value,
        context: &RunContext,
    ) -> Result<String, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Validate `arguments` against a JSON Schema.
///
/// All violations are joined into one `InvalidArguments` reason.
pub fn validate_against_schema(
    tool_name: &str,
    schema: &serde_json::Value,
    arguments: &serde_json::Value,
) -> Result<(), ToolError> {
    let validator = jsonschema::Validator::new(schema)
        .map_err(|e| ToolError::Internal(format!("invalid schema for tool {tool_name}: {e}")))?;
    if validator.is_valid(arguments) {
        return Ok(());
    }
    let errors: Vec<String> = validator
        .iter_errors(arguments)
        .map(|e| e.to_string())
        .collect();
    Err(ToolError::InvalidArguments {
        tool_name: tool_name.to_string(),
        reason: errors.join("; "),
    })
}

/// Coerce validated arguments into a typed parameter struct.
pub fn parse_arguments<T: DeserializeOwned>(
    tool_name: &str,
    arguments: serde_json::Value,
) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments {
        tool_name: tool_name.to_string(),
        reason: e.to_string(),
    })
}

/// An ordered set of tools available to a run.
///
/// Lookup is by exact name. Registering a tool whose name is already taken
/// replaces the earlier one in place, so names stay unique.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(pos) => self.tools[pos] = tool,
            None => self.tools.push(tool),
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.register(Arc::new(tool));
        self
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    /// Get all tool definitions (for sending to the LLM).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
