//! Run event system: decoupled observation of every step of an agent run.
//!
//! The agent loop, the tool dispatcher, and executors publish [`Event`]s on an
//! [`EventBus`]. Observers subscribe by [`EventName`] without the emitters
//! knowing about them.
//!
//! Delivery is synchronous and follows registration order. A panicking
//! listener is logged and skipped; it never reaches the emitter and never
//! stops delivery to the listeners after it.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::context::RunContext;
use crate::error::ToolError;
use crate::message::{Message, ToolCall};

/// The closed set of event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventName {
    /// A run started
    #[serde(rename = "run:start")]
    RunStart,
    /// A run finished, after post-run transforms
    #[serde(rename = "run:end")]
    RunEnd,
    /// A batch of tool calls is about to be dispatched
    #[serde(rename = "tools:start")]
    ToolsStart,
    /// A batch of tool calls settled
    #[serde(rename = "tools:end")]
    ToolsEnd,
    /// A single tool is about to be invoked
    #[serde(rename = "tool:start")]
    ToolStart,
    /// A single tool invocation settled
    #[serde(rename = "tool:end")]
    ToolEnd,
    /// The executor is about to be called (once per turn)
    #[serde(rename = "turn:start")]
    TurnStart,
    /// The executor returned and pre-tool-call transforms ran
    #[serde(rename = "turn:end")]
    TurnEnd,
    /// An executor is sending a raw backend request; shape varies per executor
    #[serde(rename = "raw:request")]
    RawRequest,
    /// An executor received a raw backend response; shape varies per executor
    #[serde(rename = "raw:response")]
    RawResponse,
}

impl EventName {
    pub const ALL: [EventName; 10] = [
        EventName::RunStart,
        EventName::RunEnd,
        EventName::ToolsStart,
        EventName::ToolsEnd,
        EventName::ToolStart,
        EventName::ToolEnd,
        EventName::TurnStart,
        EventName::TurnEnd,
        EventName::RawRequest,
        EventName::RawResponse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::RunStart => "run:start",
            EventName::RunEnd => "run:end",
            EventName::ToolsStart => "tools:start",
            EventName::ToolsEnd => "tools:end",
            EventName::ToolStart => "tool:start",
            EventName::ToolEnd => "tool:end",
            EventName::TurnStart => "turn:start",
            EventName::TurnEnd => "turn:end",
            EventName::RawRequest => "raw:request",
            EventName::RawResponse => "raw:response",
        }
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event with a payload borrowed from the emitter.
///
/// Every variant carries the run's [`RunContext`] as correlation key. End
/// events carry the wall-clock time elapsed since their start event.
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    RunStart {
        context: &'a RunContext,
        /// Seed conversation
        messages: &'a [Message],
        system_prompt: Option<&'a str>,
        model_id: &'a str,
    },
    RunEnd {
        context: &'a RunContext,
        /// Every message the run produced
        messages: &'a [Message],
        model_id: &'a str,
        elapsed: Duration,
    },
    ToolsStart {
        context: &'a RunContext,
        /// The tool-call messages being dispatched
        tool_calls: &'a [Message],
    },
    ToolsEnd {
        context: &'a RunContext,
        results: &'a [Message],
        elapsed: Duration,
    },
    ToolStart {
        context: &'a RunContext,
        tool_call: &'a ToolCall,
    },
    ToolEnd {
        context: &'a RunContext,
        result: &'a Message,
        /// The failure behind an `error` result, if any
        error: Option<&'a ToolError>,
        elapsed: Duration,
    },
    TurnStart {
        context: &'a RunContext,
        /// Messages sent to the executor
        messages: &'a [Message],
        system_prompt: Option<&'a str>,
        model_id: &'a str,
    },
    TurnEnd {
        context: &'a RunContext,
        /// Response messages after pre-tool-call transforms
        messages: &'a [Message],
        model_id: &'a str,
        elapsed: Duration,
    },
    RawRequest {
        context: &'a RunContext,
        model_id: &'a str,
        request: &'a serde_json::Value,
    },
    RawResponse {
        context: &'a RunContext,
        model_id: &'a str,
        response: &'a serde_json::Value,
        elapsed: Duration,
    },
}

impl<'a> Event<'a> {
    pub fn name(&self) -> EventName {
        match self {
            Event::RunStart { .. } => EventName::RunStart,
            Event::RunEnd { .. } => EventName::RunEnd,
            Event::ToolsStart { .. } => EventName::ToolsStart,
            Event::ToolsEnd { .. } => EventName::ToolsEnd,
            Event::ToolStart { .. } => EventName::ToolStart,
            Event::ToolEnd { .. } => EventName::ToolEnd,
            Event::TurnStart { .. } => EventName::TurnStart,
            Event::TurnEnd { .. } => EventName::TurnEnd,
            Event::RawRequest { .. } => EventName::RawRequest,
            Event::RawResponse { .. } => EventName::RawResponse,
        }
    }

    pub fn context(&self) -> &'a RunContext {
        match *self {
            Event::RunStart { context, .. }
            | Event::RunEnd { context, .. }
            | Event::ToolsStart { context, .. }
            | Event::ToolsEnd { context, .. }
            | Event::ToolStart { context, .. }
            | Event::ToolEnd { context, .. }
            | Event::TurnStart { context, .. }
            | Event::TurnEnd { context, .. }
            | Event::RawRequest { context, .. }
            | Event::RawResponse { context, .. } => context,
        }
    }

    /// Elapsed time for end events, `None` for start events.
    pub fn elapsed(&self) -> Option<Duration> {
        match *self {
            Event::RunEnd { elapsed, .. }
            | Event::ToolsEnd { elapsed, .. }
            | Event::ToolEnd { elapsed, .. }
            | Event::TurnEnd { elapsed, .. }
            | Event::RawResponse { elapsed, .. } => Some(elapsed),
            Event::RunStart { .. }
            | Event::ToolsStart { .. }
            | Event::ToolStart { .. }
            | Event::TurnStart { .. }
            | Event::RawRequest { .. } => None,
        }
    }
}

/// A subscribed callback.
pub type Listener = Arc<dyn Fn(&Event<'_>) + Send + Sync>;

/// Handle returned by the `subscribe*` methods, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, Copy)]
enum Filter {
    Only(EventName),
    All,
}

impl Filter {
    fn matches(self, name: EventName) -> bool {
        match self {
            Filter::Only(wanted) => wanted == name,
            Filter::All => true,
        }
    }
}

struct Registration {
    id: SubscriptionId,
    filter: Filter,
    once: bool,
    listener: Listener,
}

/// A synchronous publish/subscribe bus for run events.
///
/// Safe to share between concurrent runs. The listener list is locked only
/// while it is read or changed, never while listeners execute, so a
/// listener may subscribe or unsubscribe from inside its own callback.
pub struct EventBus {
    listeners: Mutex<Vec<Registration>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// The process-wide bus, created on first use.
    pub fn global() -> Arc<EventBus> {
        static GLOBAL: OnceLock<Arc<EventBus>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(EventBus::new())).clone()
    }

    /// Call `listener` for every event named `name`.
    pub fn subscribe<F>(&self, name: EventName, listener: F) -> SubscriptionId
    where
        F: Fn(&Event<'_>) + Send + Sync + 'static,
    {
        self.register(Filter::Only(name), false, Arc::new(listener))
    }

    /// Call `listener` for the next event named `name` only.
    pub fn subscribe_once<F>(&self, name: EventName, listener: F) -> SubscriptionId
    where
        F: Fn(&Event<'_>) + Send + Sync + 'static,
    {
        self.register(Filter::Only(name), true, Arc::new(listener))
    }

    /// Call `listener` for every event regardless of name.
    pub fn subscribe_all<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Event<'_>) + Send + Sync + 'static,
    {
        self.register(Filter::All, false, Arc::new(listener))
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|r| r.id != id);
        listeners.len() != before
    }

    /// Number of listeners that would receive an event named `name`.
    pub fn listener_count(&self, name: EventName) -> usize {
        self.lock().iter().filter(|r| r.filter.matches(name)).count()
    }

    /// Deliver `event` to its listeners, in registration order.
    pub fn emit(&self, event: &Event<'_>) {
        let name = event.name();

        // Once-listeners leave the list here, under the lock, so that two
        // concurrent emits cannot both deliver to them.
        let targets: Vec<Listener> = {
            let mut listeners = self.lock();
            let targets = listeners
                .iter()
                .filter(|r| r.filter.matches(name))
                .map(|r| Arc::clone(&r.listener))
                .collect();
            listeners.retain(|r| !(r.once && r.filter.matches(name)));
            targets
        };

        for listener in targets {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
                warn!(
                    event = %name,
                    run_id = %event.context().run_id,
                    error = %panic_message(payload.as_ref()),
                    "Event listener panicked"
                );
            }
        }
    }

    fn register(&self, filter: Filter, once: bool, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push(Registration {
            id,
            filter,
            once,
            listener,
        });
        id
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Registration>> {
        // Listeners never run under the lock, so a poisoned list is still consistent.
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.lock().len())
            .finish()
    }
}

/// Best-effort text of a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
