//! Tool catalogue for backends without native tool calling.

use parley_core::ToolRegistry;
use serde_json::json;

const PREAMBLE: &str = "You have the following tools available to help answer the user's request. \
You can call one or more functions at a time. The functions are described here in JSON-schema format";

const INSTRUCTIONS: &str = "To call one or more tools, provide the tool calls on a new line as a \
JSON-formatted array. Explain your steps in a neutral tone. Then, only call the tools you can for \
the first step, then end your turn. If you previously received an error, you can try to call the \
tool again. Give up after 3 errors.";

const EXAMPLE: &str = r#"[{"name": "SampleTool", "arguments": {"foo": "bar"}},{"name": "SampleTool", "arguments": {"foo": "other"}}]"#;

/// Describe every tool in `tools` and how to call them, in the single-line
/// array format that [`InlineToolCallParser`](crate::transforms::InlineToolCallParser)
/// reads back.
///
/// Append the result to the system prompt of a backend that cannot take
/// tool definitions directly.
pub fn render_tool_prompt(tools: &ToolRegistry) -> String {
    let mut lines = vec![PREAMBLE.to_string(), String::new()];
    lines.extend(tools.definitions().into_iter().map(|def| {
        json!({
            "type": "function",
            "function": {
                "name": def.name,
                "description": def.description,
                "parameters": def.parameters,
            }
        })
        .to_string()
    }));
    lines.push(String::new());
    lines.push(INSTRUCTIONS.to_string());
    lines.push(String::new());
    lines.push("Conform precisely to the single-line format of this example".to_string());
    lines.push("Tool Call:".to_string());
    lines.push(EXAMPLE.to_string());
    lines.join("\n")
}
