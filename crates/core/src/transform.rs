//! Message transforms applied between turns.
//!
//! A transform rewrites a list of messages: it may filter, merge, or inject
//! messages, but must keep every tool call / tool result pair it passes
//! through correlated by id. Transforms are registered at one of three
//! [`PipelinePoint`]s and run strictly in registration order.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TransformError;
use crate::message::Message;

/// A rewrite of a message list.
#[async_trait]
pub trait MessageTransform: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    async fn transform(&self, messages: Vec<Message>) -> Result<Vec<Message>, TransformError>;
}

/// A transform backed by a plain synchronous function.
pub struct FnTransform<F> {
    name: String,
    f: F,
}

/// Wrap an infallible function as a [`MessageTransform`].
pub fn transform_fn<F>(name: impl Into<String>, f: F) -> FnTransform<F>
where
    F: Fn(Vec<Message>) -> Vec<Message> + Send + Sync,
{
    FnTransform {
        name: name.into(),
        f,
    }
}

#[async_trait]
impl<F> MessageTransform for FnTransform<F>
where
    F: Fn(Vec<Message>) -> Vec<Message> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn transform(&self, messages: Vec<Message>) -> Result<Vec<Message>, TransformError> {
        Ok((self.f)(messages))
    }
}

/// Where in a run a transform set is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelinePoint {
    /// On each executor response, before tool dispatch
    PreToolCall,
    /// On a turn's response plus its tool results, before the next turn
    PostToolCall,
    /// Once on the whole run output
    PostRun,
}

/// An ordered sequence of transforms.
#[derive(Clone, Default)]
pub struct TransformSet {
    transforms: Vec<Arc<dyn MessageTransform>>,
}

impl TransformSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, transform: Arc<dyn MessageTransform>) {
        self.transforms.push(transform);
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Feed `messages` through every transform in order. The output of each
    /// transform is the input of the next; an empty set returns its input.
    pub async fn apply(&self, messages: Vec<Message>) -> Result<Vec<Message>, TransformError> {
        let mut messages = messages;
        for transform in &self.transforms {
            tracing::trace!(transform = transform.name(), count = messages.len(), "Applying transform");
            messages = transform.transform(messages).await?;
        }
        Ok(messages)
    }
}

impl std::fmt::Debug for TransformSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.transforms.iter().map(|t| t.name()))
            .finish()
    }
}

/// The three transform sets of an agent.
#[derive(Debug, Clone, Default)]
pub struct TransformPipeline {
    pre_tool_call: TransformSet,
    post_tool_call: TransformSet,
    post_run: TransformSet,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `transform` to the set at `point`.
    pub fn register(&mut self, point: PipelinePoint, transform: Arc<dyn MessageTransform>) {
        self.set_mut(point).push(transform);
    }

    pub fn set(&self, point: PipelinePoint) -> &TransformSet {
        match point {
            PipelinePoint::PreToolCall => &self.pre_tool_call,
            PipelinePoint::PostToolCall => &self.post_tool_call,
            PipelinePoint::PostRun => &self.post_run,
        }
    }

    fn set_mut(&mut self, point: PipelinePoint) -> &mut TransformSet {
        match point {
            PipelinePoint::PreToolCall => &mut self.pre_tool_call,
            PipelinePoint::PostToolCall => &mut self.post_tool_call,
            PipelinePoint::PostRun => &mut self.post_run,
        }
    }

    pub async fn apply(
        &self,
        point: PipelinePoint,
        messages: Vec<Message>,
    ) -> Result<Vec<Message>, TransformError> {
        self.set(point).apply(messages).await
    }
}
