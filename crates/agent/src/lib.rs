//! The agent loop: the heart of Parley.
//!
//! A run follows a **Call → Act → Observe** cycle:
//!
//! 1. **Call** the configured [`ChatExecutor`](parley_core::ChatExecutor)
//!    with the conversation so far
//! 2. **Transform** the response (pre-tool-call transforms)
//! 3. **If tool calls**: dispatch them concurrently, fold the results
//!    (success or failure) back into the conversation, loop back to step 1
//! 4. **Otherwise**: apply the post-run transforms and return
//!
//! Every step is published on an [`EventBus`](parley_core::EventBus).

pub mod dispatcher;
pub mod loop_runner;
pub mod offline;
pub mod prompt;
pub mod transforms;

pub use dispatcher::ToolDispatcher;
pub use loop_runner::{AgentLoop, RunInput, RunOutput};
pub use offline::{EchoExecutor, ScriptedExecutor};
pub use prompt::render_tool_prompt;
pub use transforms::{InlineToolCallParser, ToolCallFilter};
