//! Built-in tools for Parley.
//!
//! Small, self-contained tools that need no network or filesystem access:
//! arithmetic, letter counting, and the current time. They are enough to
//! exercise every path of the agent loop, from a single call to several
//! concurrent ones.

pub mod calculator;
pub mod current_time;
pub mod letter_count;

use std::sync::Arc;

use parley_core::{Tool, ToolRegistry};
use tracing::warn;

pub use calculator::CalculatorTool;
pub use current_time::CurrentTimeTool;
pub use letter_count::CountLettersTool;

/// Every built-in tool, in registration order.
pub fn builtin_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(CalculatorTool),
        Arc::new(CountLettersTool),
        Arc::new(CurrentTimeTool),
    ]
}

/// Names of the built-in tools.
pub fn builtin_names() -> Vec<String> {
    builtin_tools().iter().map(|t| t.name().to_string()).collect()
}

/// Create a registry with all built-in tools.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for tool in builtin_tools() {
        registry.register(tool);
    }
    registry
}

/// Create a registry with the built-in tools named in `enabled`.
///
/// Unknown names are logged and skipped.
pub fn registry_with(enabled: &[String]) -> ToolRegistry {
    let available = builtin_tools();
    let mut registry = ToolRegistry::new();
    for name in enabled {
        match available.iter().find(|t| t.name() == name.as_str()) {
            Some(tool) => registry.register(Arc::clone(tool)),
            None => warn!(tool = %name, "Unknown tool in configuration, skipping"),
        }
    }
    registry
}
