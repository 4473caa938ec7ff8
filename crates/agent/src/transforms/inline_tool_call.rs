//! Recover tool calls that a model wrote into its text reply.
//!
//! Backends without native tool calling are told (see
//! [`render_tool_prompt`](crate::prompt::render_tool_prompt)) to answer with a
//! single-line JSON array such as
//! `[{"name": "CalculatorTool", "arguments": {"expr": "3 + 4"}}]`.
//! Models follow this loosely: the array may be wrapped over several lines,
//! surrounded by prose, or use `tool` instead of `name`. Prose around the
//! array is dropped.

use std::sync::LazyLock;

use async_trait::async_trait;
use parley_core::{Message, MessageTransform, ToolCall, TransformError};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, error};

static OBJECT_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\n\s*\{").expect("object separator pattern"));
static ARRAY_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\n\s*\{").expect("array open pattern"));
static ARRAY_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\}\n\s*\]").expect("array close pattern"));
static INLINE_CALLS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)\[\{"(?:name|tool)".*$"#).expect("inline call pattern"));

/// One element of an inline call array.
#[derive(Debug, Deserialize)]
struct InlineCall {
    #[serde(alias = "tool")]
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

/// Replaces assistant messages that embed a JSON tool-call array with a
/// tool-call message. Anything it cannot parse passes through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineToolCallParser;

impl InlineToolCallParser {
    pub fn new() -> Self {
        Self
    }

    pub fn apply(&self, messages: Vec<Message>) -> Vec<Message> {
        messages
            .into_iter()
            .map(|message| {
                let parsed = match &message {
                    Message::Assistant { content, .. } => self.parse(content),
                    _ => None,
                };
                parsed.unwrap_or(message)
            })
            .collect()
    }

    /// Extract a tool-call message from `text`, if it holds a parseable
    /// call array.
    pub fn parse(&self, text: &str) -> Option<Message> {
        let text = normalize(text);
        let candidates: Vec<&str> = INLINE_CALLS.find_iter(&text).map(|m| m.as_str()).collect();
        if candidates.is_empty() {
            return None;
        }

        debug!(text = %text, "Parsing inline tool call from response text");
        match parse_candidates(&candidates) {
            Ok(calls) if !calls.is_empty() => Some(Message::tool_call(calls)),
            Ok(_) => {
                debug!("Inline tool call array was empty");
                None
            }
            Err(e) => {
                error!(error = %e, text = %text, "Error parsing inline tool call");
                None
            }
        }
    }
}

#[async_trait]
impl MessageTransform for InlineToolCallParser {
    fn name(&self) -> &str {
        "inline_tool_call_parser"
    }

    async fn transform(&self, messages: Vec<Message>) -> Result<Vec<Message>, TransformError> {
        Ok(self.apply(messages))
    }
}

/// Join call arrays that were wrapped over several lines.
fn normalize(text: &str) -> String {
    let text = OBJECT_SEPARATOR.replace_all(text, ",{");
    let text = ARRAY_OPEN.replace_all(&text, "[{");
    ARRAY_CLOSE.replace_all(&text, "}]").into_owned()
}

fn parse_candidates(candidates: &[&str]) -> Result<Vec<ToolCall>, serde_json::Error> {
    let mut calls = Vec::new();
    for candidate in candidates {
        // Trailing prose on the same line follows the closing bracket.
        let end = candidate.rfind(']').map_or(0, |i| i + 1);
        let parsed: Vec<InlineCall> = serde_json::from_str(&candidate[..end])?;
        calls.extend(
            parsed
                .into_iter()
                .map(|call| ToolCall::new(call.name, call.arguments)),
        );
    }
    Ok(calls)
}
