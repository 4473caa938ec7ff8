//! # Parley Core
//!
//! Domain types, traits, and error definitions for the Parley agent loop.
//! It holds no backend or tool implementations: it defines the message
//! protocol and the contracts that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the agent loop is a trait here:
//! - [`ChatExecutor`] for model backends
//! - [`Tool`] for capabilities
//! - [`MessageTransform`] for rewrites between turns
//!
//! Implementations live in their respective crates, so backends and tools
//! can be swapped or mocked without touching the loop.

pub mod context;
pub mod error;
pub mod event;
pub mod executor;
pub mod message;
pub mod tool;
pub mod transform;

// Re-export key types at crate root for ergonomics
pub use context::{RunContext, RunId};
pub use error::{Error, ExecutorError, Result, ToolError, TransformError};
pub use event::{Event, EventBus, EventName, SubscriptionId};
pub use executor::{ChatExecutor, ExecutorRequest, ExecutorResponse, Usage};
pub use message::{Message, Role, ToolCall, ToolStatus};
pub use tool::{Tool, ToolDefinition, ToolRegistry};
pub use transform::{MessageTransform, PipelinePoint, TransformPipeline, TransformSet, transform_fn};
