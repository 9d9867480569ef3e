//! Outbound notification fan-out.
//!
//! Channels subscribe to the `Notifier` and receive every broadcast message.
//! Subscribers are held as channel senders, so broadcasting never blocks and
//! a slow channel cannot stall the agent. Dead subscribers are pruned on the
//! next broadcast.

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;

/// Cloneable handle for delivering notifications to all subscribed channels.
#[derive(Clone, Default)]
pub struct Notifier {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<String>>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber and return its receiving end.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    /// Deliver a message to every live subscriber.
    pub fn broadcast(&self, message: &str) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| tx.send(message.to_string()).is_ok());
        debug!(
            subscribers = subscribers.len(),
            "notification broadcast: {message}"
        );
    }

    /// Number of live subscribers (after the last prune).
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}
