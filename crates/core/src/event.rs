//! Event types and the queue decoupling the scheduler from event processing.
//!
//! The scheduler (producer) pushes `EventContext`s without ever blocking; a
//! single processor loop (consumer) pops them and dispatches to the
//! orchestration collaborator via the `EventHandler` trait.
//!
//! Ordering: strict FIFO of enqueue order. Alarms fired within one check pass
//! are enqueued in ascending trigger-time order, so processing order matches
//! trigger order within a pass — but NOT globally across passes if processing
//! lags behind production.
//!
//! Delivery: effectively at-most-once. The queue is in-memory only; events
//! die with the process. See the scheduler docs for the crash window.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::Error;
use crate::message::TimestampedMessage;
use crate::provider::Usage;
use crate::request::RequestContext;

/// An ephemeral record describing why a downstream invocation is occurring
/// absent direct user input. Exists only on the queue, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventContext {
    /// Which component produced the event (e.g. "alarm_scheduler")
    pub event_source: String,

    /// Human-readable description of what triggered the event
    pub event_description: String,

    /// Extra key/value payload (alarm id, channel, lateness flag, ...)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub additional_data: serde_json::Map<String, serde_json::Value>,
}

/// A system-originated event the orchestrator can respond to.
#[derive(Debug, Clone)]
pub struct SystemEvent {
    /// Description of what triggered the event
    pub event_description: String,

    /// The message the model will respond to
    pub message: TimestampedMessage,

    /// Source of the event
    pub event_source: String,

    /// Additional data associated with the event
    pub additional_data: serde_json::Map<String, serde_json::Value>,
}

impl SystemEvent {
    /// Build a system event from a queued event context.
    pub fn from_event_context(context: EventContext) -> Self {
        Self {
            event_description: "A scheduled event fired at its trigger time.".into(),
            message: TimestampedMessage::user(context.event_description).at(Utc::now()),
            event_source: context.event_source,
            additional_data: context.additional_data,
        }
    }
}

/// A user-originated event (one message turn on some channel).
#[derive(Debug, Clone)]
pub struct UserEvent {
    /// Description of what triggered the event
    pub event_description: String,

    /// The message the model will respond to
    pub message: TimestampedMessage,

    /// ID of the user who triggered the event (not the display name)
    pub user_id: String,

    /// Human-readable name of the user
    pub user_name: String,

    /// The channel where the event occurred
    pub channel_id: String,

    /// Immediate channel history from before the event, merged with the
    /// user's persisted history when assembling the prompt
    pub immediate_history: Vec<TimestampedMessage>,
}

/// The orchestrator's answer to an event.
#[derive(Debug, Clone)]
pub struct EventResponse {
    /// The assistant message
    pub message: TimestampedMessage,

    /// Token usage reported by the provider, for instrumentation
    pub usage: Option<Usage>,
}

/// The orchestration collaborator contract.
///
/// Implemented by the agent crate; consumed by the event processor and the
/// input channels so neither depends on orchestrator internals.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one user message turn.
    async fn handle_user_event(
        &self,
        ctx: &RequestContext,
        event: UserEvent,
    ) -> std::result::Result<EventResponse, Error>;

    /// Handle one system event (e.g. a fired alarm).
    async fn handle_system_event(
        &self,
        ctx: &RequestContext,
        event: SystemEvent,
    ) -> std::result::Result<EventResponse, Error>;
}

/// Create a connected queue handle / receiver pair.
pub fn event_queue() -> (EventQueue, EventQueueReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventQueue { tx }, EventQueueReceiver { rx })
}

/// Producer handle for the event queue. Cloneable; `push` never blocks and
/// never applies backpressure to the caller.
#[derive(Clone)]
pub struct EventQueue {
    tx: mpsc::UnboundedSender<EventContext>,
}

impl EventQueue {
    /// Enqueue an event. If the consumer is gone the event is dropped; that
    /// only happens during shutdown, when dropping is the right outcome.
    pub fn push(&self, event: EventContext) {
        if self.tx.send(event).is_err() {
            tracing::warn!("Event queue receiver dropped; discarding event");
        }
    }

    /// Whether the consumer side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side of the event queue. Single-owner: exactly one processor
/// loop drains it, preserving FIFO order.
pub struct EventQueueReceiver {
    rx: mpsc::UnboundedReceiver<EventContext>,
}

impl EventQueueReceiver {
    /// Wait for the next event. Returns `None` once all producers are gone
    /// and the queue is drained.
    pub async fn pop(&mut self) -> Option<EventContext> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(description: &str) -> EventContext {
        EventContext {
            event_source: "test".into(),
            event_description: description.into(),
            additional_data: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn queue_preserves_fifo_order() {
        let (queue, mut rx) = event_queue();
        queue.push(event("first"));
        queue.push(event("second"));
        queue.push(event("third"));

        assert_eq!(rx.pop().await.unwrap().event_description, "first");
        assert_eq!(rx.pop().await.unwrap().event_description, "second");
        assert_eq!(rx.pop().await.unwrap().event_description, "third");
    }

    #[tokio::test]
    async fn pop_returns_none_when_producers_gone() {
        let (queue, mut rx) = event_queue();
        queue.push(event("last"));
        drop(queue);

        assert!(rx.pop().await.is_some());
        assert!(rx.pop().await.is_none());
    }

    #[tokio::test]
    async fn push_after_receiver_dropped_does_not_panic() {
        let (queue, rx) = event_queue();
        drop(rx);
        queue.push(event("orphan"));
        assert!(queue.is_closed());
    }

    #[test]
    fn system_event_from_context_keeps_payload() {
        let mut data = serde_json::Map::new();
        data.insert("alarm_id".into(), serde_json::json!(42));
        let context = EventContext {
            event_source: "alarm_scheduler".into(),
            event_description: "Alarm fired: standup".into(),
            additional_data: data,
        };

        let system_event = SystemEvent::from_event_context(context);
        assert_eq!(system_event.event_source, "alarm_scheduler");
        assert_eq!(system_event.message.content, "Alarm fired: standup");
        assert_eq!(system_event.additional_data["alarm_id"], 42);
    }
}
