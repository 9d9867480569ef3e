//! Console channel: interactive stdin/stdout chat.
//!
//! Reads lines from stdin, runs each as one user turn, and prints replies.
//! Also prints every broadcast notification (fired alarms land here), so the
//! console doubles as the delivery surface for system events.

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use bruin_core::event::{EventHandler, UserEvent};
use bruin_core::message::TimestampedMessage;
use bruin_core::request::RequestContext;

use crate::notify::Notifier;
use crate::validator::MessageValidator;

/// How many recent messages the console keeps as immediate history.
const IMMEDIATE_HISTORY_CAP: usize = 16;

/// The interactive console channel.
pub struct ConsoleChannel {
    handler: Arc<dyn EventHandler>,
    notifier: Notifier,
    validator: MessageValidator,
    user_id: String,
    user_name: String,
}

impl ConsoleChannel {
    pub fn new(
        handler: Arc<dyn EventHandler>,
        notifier: Notifier,
        validator: MessageValidator,
        user_id: impl Into<String>,
        user_name: impl Into<String>,
    ) -> Self {
        Self {
            handler,
            notifier,
            validator,
            user_id: user_id.into(),
            user_name: user_name.into(),
        }
    }

    /// Run the interactive loop until EOF, an exit command, or shutdown.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut notifications = self.notifier.subscribe();
        let stdin = BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();

        // Channel-local recent messages, merged with the persisted history
        // each turn
        let mut immediate_history: Vec<TimestampedMessage> = Vec::new();

        info!("console channel ready (type 'exit' to quit)");
        println!("bruin ready. Type a message, or 'exit' to quit.");

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let line = match line {
                        Ok(Some(line)) => line,
                        Ok(None) => {
                            info!("stdin closed; console channel stopping");
                            break;
                        }
                        Err(e) => {
                            error!("failed to read stdin: {e}");
                            break;
                        }
                    };

                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    if matches!(input, "exit" | "quit") {
                        println!("bye!");
                        break;
                    }

                    let content = self.validator.validate(input);
                    let message = TimestampedMessage::user(content);

                    let event = UserEvent {
                        event_description: "console message".into(),
                        message: message.clone(),
                        user_id: self.user_id.clone(),
                        user_name: self.user_name.clone(),
                        channel_id: "console".into(),
                        immediate_history: immediate_history.clone(),
                    };

                    let ctx = RequestContext::new();
                    debug!(request_id = %ctx.request_id, "console turn started");

                    match self.handler.handle_user_event(&ctx, event).await {
                        Ok(response) => {
                            println!("{}", response.message.content);
                            push_capped(&mut immediate_history, message);
                            push_capped(&mut immediate_history, response.message);
                        }
                        Err(e) => {
                            error!(request_id = %ctx.request_id, "turn failed: {e}");
                            println!("(something went wrong: {e})");
                        }
                    }
                }
                notification = notifications.recv() => {
                    match notification {
                        Some(text) => println!("\n🔔 {text}"),
                        None => {
                            debug!("notifier closed");
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("console channel shutting down");
                    break;
                }
            }
        }
    }
}

fn push_capped(history: &mut Vec<TimestampedMessage>, message: TimestampedMessage) {
    history.push(message);
    if history.len() > IMMEDIATE_HISTORY_CAP {
        let excess = history.len() - IMMEDIATE_HISTORY_CAP;
        history.drain(..excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_history_is_capped() {
        let mut history = Vec::new();
        for i in 0..(IMMEDIATE_HISTORY_CAP + 4) {
            push_capped(&mut history, TimestampedMessage::user(format!("m{i}")));
        }
        assert_eq!(history.len(), IMMEDIATE_HISTORY_CAP);
        assert_eq!(history[0].content, "m4");
    }
}
