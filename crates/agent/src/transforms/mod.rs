//! Reference [`MessageTransform`](parley_core::MessageTransform)s for
//! backends that mix text with tool calls or cannot call tools natively.

pub mod inline_tool_call;
pub mod tool_call_filter;

pub use inline_tool_call::InlineToolCallParser;
pub use tool_call_filter::ToolCallFilter;
