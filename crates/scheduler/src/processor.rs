//! The event processor: the single consumer of the event queue.
//!
//! Pops queued event contexts one at a time and hands each to the
//! orchestration collaborator as a system event. A failed event is logged
//! with its request id and discarded; the loop never stops for one bad event.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use bruin_core::event::{EventHandler, EventQueueReceiver, SystemEvent};
use bruin_core::request::RequestContext;

/// Drain the event queue until shutdown is signalled or all producers are
/// gone.
pub async fn run_event_processor(
    mut rx: EventQueueReceiver,
    handler: Arc<dyn EventHandler>,
    mut shutdown: broadcast::Receiver<()>,
) {
    info!("event processor started");

    loop {
        tokio::select! {
            event = rx.pop() => {
                let Some(context) = event else {
                    info!("event queue closed; event processor stopping");
                    break;
                };

                let ctx = RequestContext::new();
                debug!(
                    request_id = %ctx.request_id,
                    source = %context.event_source,
                    "processing event"
                );

                let system_event = SystemEvent::from_event_context(context);
                match handler.handle_system_event(&ctx, system_event).await {
                    Ok(response) => {
                        debug!(
                            request_id = %ctx.request_id,
                            "event handled: {}",
                            response.message.content
                        );
                    }
                    Err(e) => {
                        // Discard and move on; the event is not retried.
                        error!(request_id = %ctx.request_id, "event handling failed: {e}");
                    }
                }
            }
            _ = shutdown.recv() => {
                info!("event processor shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bruin_core::error::Error;
    use bruin_core::event::{event_queue, EventContext, EventResponse, UserEvent};
    use bruin_core::message::TimestampedMessage;
    use std::sync::Mutex;

    /// Records handled events; fails when the description says so.
    struct RecordingHandler {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        async fn handle_user_event(
            &self,
            _ctx: &RequestContext,
            _event: UserEvent,
        ) -> Result<EventResponse, Error> {
            unreachable!("processor only dispatches system events")
        }

        async fn handle_system_event(
            &self,
            _ctx: &RequestContext,
            event: SystemEvent,
        ) -> Result<EventResponse, Error> {
            if event.message.content.contains("poison") {
                return Err(Error::Internal("simulated failure".into()));
            }
            self.seen.lock().unwrap().push(event.message.content.clone());
            Ok(EventResponse {
                message: TimestampedMessage::ai("done"),
                usage: None,
            })
        }
    }

    fn event(description: &str) -> EventContext {
        EventContext {
            event_source: "alarm_scheduler".into(),
            event_description: description.into(),
            additional_data: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn processes_events_in_order() {
        let (queue, rx) = event_queue();
        let handler = Arc::new(RecordingHandler {
            seen: Mutex::new(Vec::new()),
        });
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        queue.push(event("first"));
        queue.push(event("second"));
        drop(queue);

        run_event_processor(rx, handler.clone(), shutdown_rx).await;

        let seen = handler.seen.lock().unwrap();
        assert_eq!(*seen, vec!["first".to_string(), "second".to_string()]);
    }

    #[tokio::test]
    async fn failed_event_is_discarded_and_loop_continues() {
        let (queue, rx) = event_queue();
        let handler = Arc::new(RecordingHandler {
            seen: Mutex::new(Vec::new()),
        });
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        queue.push(event("before"));
        queue.push(event("poison"));
        queue.push(event("after"));
        drop(queue);

        run_event_processor(rx, handler.clone(), shutdown_rx).await;

        let seen = handler.seen.lock().unwrap();
        assert_eq!(*seen, vec!["before".to_string(), "after".to_string()]);
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let (queue, rx) = event_queue();
        let handler = Arc::new(RecordingHandler {
            seen: Mutex::new(Vec::new()),
        });
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let task = tokio::spawn(run_event_processor(rx, handler, shutdown_rx));
        shutdown_tx.send(()).unwrap();
        task.await.unwrap();
        drop(queue);
    }
}
