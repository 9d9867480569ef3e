//! Notification tool: how the model reaches users.
//!
//! System-event turns (fired alarms) have no reply channel of their own, so
//! their only user-visible effect is a broadcast through this tool.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use bruin_channels::Notifier;
use bruin_core::error::ToolError;
use bruin_core::tool::Tool;

/// Broadcasts a message to every subscribed channel.
pub struct NotifyUsersTool {
    notifier: Notifier,
}

#[derive(Deserialize)]
struct NotifyInput {
    message: String,
}

impl NotifyUsersTool {
    pub fn new(notifier: Notifier) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl Tool for NotifyUsersTool {
    fn name(&self) -> &str {
        "notify_users"
    }

    fn description(&self) -> &str {
        "Send a notification message to the user's active channels. \
         Use this to deliver alarm notifications."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "The notification text to deliver"
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let input: NotifyInput = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        self.notifier.broadcast(&input.message);
        let delivered = self.notifier.subscriber_count();
        info!(subscribers = delivered, "notification sent");

        if delivered == 0 {
            Ok("Notification sent, but no channels are currently listening.".into())
        } else {
            Ok(format!("Notification delivered to {delivered} channel(s)."))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notification_reaches_subscribers() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        let tool = NotifyUsersTool::new(notifier);

        let result = tool
            .execute(serde_json::json!({"message": "Alarm: standup now"}))
            .await
            .unwrap();
        assert!(result.contains("delivered to 1"));
        assert_eq!(rx.recv().await.unwrap(), "Alarm: standup now");
    }

    #[tokio::test]
    async fn no_subscribers_is_reported() {
        let tool = NotifyUsersTool::new(Notifier::new());
        let result = tool
            .execute(serde_json::json!({"message": "anyone?"}))
            .await
            .unwrap();
        assert!(result.contains("no channels"));
    }

    #[tokio::test]
    async fn missing_message_is_an_argument_error() {
        let tool = NotifyUsersTool::new(Notifier::new());
        let err = tool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
