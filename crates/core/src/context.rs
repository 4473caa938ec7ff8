//! Per-run state handed to executors, tools, and event listeners.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::Message;

/// Unique identifier for one agent run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of a single run.
///
/// Created once per `AgentLoop::run` call and owned by it; tools and
/// listeners only ever see it by shared reference. `messages` is the
/// conversation as most recently sent to the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunContext {
    pub run_id: RunId,

    /// Model identifier of the bound executor
    pub model_id: String,

    pub messages: Vec<Message>,

    /// Caller-supplied data for tools and listeners
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl RunContext {
    /// Start a run with a fresh id.
    pub fn new(
        model_id: impl Into<String>,
        messages: Vec<Message>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            run_id: RunId::new(),
            model_id: model_id.into(),
            messages,
            metadata,
        }
    }

    /// Look up a metadata entry.
    pub fn meta(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }
}
