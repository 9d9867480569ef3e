//! Alarm management tools.
//!
//! Each tool is bound at wiring time to the store and the identity of the
//! channel user it acts for. Results are natural-language strings for the
//! model; domain failures ("no such alarm") are readable results, not errors.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use bruin_core::alarm::AlarmStore;
use bruin_core::error::ToolError;
use bruin_core::tool::Tool;

/// Parse a trigger time from the model.
///
/// Accepts full RFC 3339 (offset normalized to UTC) or a bare
/// `YYYY-MM-DDTHH:MM:SS`, which is taken as UTC.
fn parse_trigger_time(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Ok(naive.and_utc());
    }
    Err(format!(
        "could not parse {raw:?} as a timestamp; use RFC 3339 like 2026-05-11T12:00:00Z"
    ))
}

fn invalid_args(e: serde_json::Error) -> ToolError {
    ToolError::InvalidArguments(e.to_string())
}

/// Creates an alarm for the bound user.
pub struct CreateAlarmTool {
    store: Arc<dyn AlarmStore>,
    user_id: String,
    channel_id: String,
}

#[derive(Deserialize)]
struct CreateAlarmInput {
    trigger_time: String,
    description: String,
}

impl CreateAlarmTool {
    pub fn new(
        store: Arc<dyn AlarmStore>,
        user_id: impl Into<String>,
        channel_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            user_id: user_id.into(),
            channel_id: channel_id.into(),
        }
    }
}

#[async_trait]
impl Tool for CreateAlarmTool {
    fn name(&self) -> &str {
        "create_alarm"
    }

    fn description(&self) -> &str {
        "Create an alarm that fires at a specific time. The user will be notified when it fires."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "trigger_time": {
                    "type": "string",
                    "description": "When the alarm fires, RFC 3339 (e.g. 2026-05-11T12:00:00Z)"
                },
                "description": {
                    "type": "string",
                    "description": "What the alarm is for"
                }
            },
            "required": ["trigger_time", "description"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let input: CreateAlarmInput =
            serde_json::from_value(arguments).map_err(invalid_args)?;

        let trigger_time = match parse_trigger_time(&input.trigger_time) {
            Ok(t) => t,
            Err(reason) => return Ok(format!("Failed to create alarm: {reason}")),
        };

        match self
            .store
            .create(trigger_time, &input.description, &self.user_id, &self.channel_id)
            .await
        {
            Ok(id) => {
                info!(alarm_id = id, user_id = %self.user_id, "alarm created");
                Ok(format!(
                    "Alarm {id} created: {} (triggers at {})",
                    input.description,
                    trigger_time.to_rfc3339()
                ))
            }
            Err(e) => Ok(format!("Failed to create alarm: {e}")),
        }
    }
}

/// Lists the bound user's alarms.
pub struct ListAlarmsTool {
    store: Arc<dyn AlarmStore>,
    user_id: String,
}

#[derive(Deserialize)]
struct ListAlarmsInput {
    #[serde(default)]
    include_past: bool,
}

impl ListAlarmsTool {
    pub fn new(store: Arc<dyn AlarmStore>, user_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
        }
    }
}

#[async_trait]
impl Tool for ListAlarmsTool {
    fn name(&self) -> &str {
        "list_alarms"
    }

    fn description(&self) -> &str {
        "List the user's upcoming alarms, soonest first."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "include_past": {
                    "type": "boolean",
                    "description": "Also include alarms whose time has already passed"
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let input: ListAlarmsInput =
            serde_json::from_value(arguments).map_err(invalid_args)?;

        match self.store.list(&self.user_id, input.include_past).await {
            Ok(alarms) if alarms.is_empty() => Ok("No alarms set.".into()),
            Ok(alarms) => {
                let lines: Vec<String> = alarms.iter().map(|a| a.to_string()).collect();
                Ok(lines.join("\n"))
            }
            Err(e) => Ok(format!("Failed to list alarms: {e}")),
        }
    }
}

/// Updates an alarm's time and/or description.
pub struct UpdateAlarmTool {
    store: Arc<dyn AlarmStore>,
}

#[derive(Deserialize)]
struct UpdateAlarmInput {
    alarm_id: i64,
    #[serde(default)]
    trigger_time: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl UpdateAlarmTool {
    pub fn new(store: Arc<dyn AlarmStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for UpdateAlarmTool {
    fn name(&self) -> &str {
        "update_alarm"
    }

    fn description(&self) -> &str {
        "Change an existing alarm's trigger time and/or description."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "alarm_id": {
                    "type": "integer",
                    "description": "The id of the alarm to update"
                },
                "trigger_time": {
                    "type": "string",
                    "description": "New trigger time, RFC 3339 (omit to keep current)"
                },
                "description": {
                    "type": "string",
                    "description": "New description (omit to keep current)"
                }
            },
            "required": ["alarm_id"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let input: UpdateAlarmInput =
            serde_json::from_value(arguments).map_err(invalid_args)?;

        if input.trigger_time.is_none() && input.description.is_none() {
            return Ok("Nothing to update: provide a new trigger_time or description.".into());
        }

        let trigger_time = match input.trigger_time.as_deref().map(parse_trigger_time) {
            Some(Ok(t)) => Some(t),
            Some(Err(reason)) => return Ok(format!("Failed to update alarm: {reason}")),
            None => None,
        };

        match self
            .store
            .update(input.alarm_id, trigger_time, input.description.as_deref())
            .await
        {
            Ok(true) => {
                info!(alarm_id = input.alarm_id, "alarm updated");
                Ok(format!("Alarm {} updated.", input.alarm_id))
            }
            Ok(false) => Ok(format!("Alarm {} not found.", input.alarm_id)),
            Err(e) => Ok(format!("Failed to update alarm: {e}")),
        }
    }
}

/// Deletes an alarm.
pub struct DeleteAlarmTool {
    store: Arc<dyn AlarmStore>,
}

#[derive(Deserialize)]
struct DeleteAlarmInput {
    alarm_id: i64,
}

impl DeleteAlarmTool {
    pub fn new(store: Arc<dyn AlarmStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for DeleteAlarmTool {
    fn name(&self) -> &str {
        "delete_alarm"
    }

    fn description(&self) -> &str {
        "Delete an alarm so it never fires."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "alarm_id": {
                    "type": "integer",
                    "description": "The id of the alarm to delete"
                }
            },
            "required": ["alarm_id"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let input: DeleteAlarmInput =
            serde_json::from_value(arguments).map_err(invalid_args)?;

        match self.store.delete(input.alarm_id).await {
            Ok(true) => {
                info!(alarm_id = input.alarm_id, "alarm deleted");
                Ok(format!("Alarm {} deleted.", input.alarm_id))
            }
            Ok(false) => Ok(format!("Alarm {} not found.", input.alarm_id)),
            Err(e) => Ok(format!("Failed to delete alarm: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bruin_store::SqliteAlarmStore;

    async fn test_store() -> Arc<dyn AlarmStore> {
        let pool = bruin_store::connect("sqlite::memory:").await.unwrap();
        Arc::new(SqliteAlarmStore::new(pool).await.unwrap())
    }

    #[test]
    fn trigger_time_accepts_rfc3339() {
        let t = parse_trigger_time("2026-05-11T12:00:00Z").unwrap();
        assert_eq!(t.to_rfc3339(), "2026-05-11T12:00:00+00:00");
    }

    #[test]
    fn trigger_time_normalizes_offsets_to_utc() {
        let t = parse_trigger_time("2026-05-11T14:00:00+02:00").unwrap();
        assert_eq!(t.to_rfc3339(), "2026-05-11T12:00:00+00:00");
    }

    #[test]
    fn naive_trigger_time_is_taken_as_utc() {
        let t = parse_trigger_time("2026-05-11T12:00:00").unwrap();
        assert_eq!(t.to_rfc3339(), "2026-05-11T12:00:00+00:00");
    }

    #[test]
    fn garbage_trigger_time_is_rejected() {
        assert!(parse_trigger_time("next tuesday").is_err());
    }

    #[tokio::test]
    async fn create_and_list_roundtrip() {
        let store = test_store().await;
        let create = CreateAlarmTool::new(store.clone(), "bob", "console");
        let list = ListAlarmsTool::new(store.clone(), "bob");

        let result = create
            .execute(serde_json::json!({
                "trigger_time": "2036-05-11T12:00:00Z",
                "description": "standup"
            }))
            .await
            .unwrap();
        assert!(result.contains("created"));
        assert!(result.contains("standup"));

        let listed = list.execute(serde_json::json!({})).await.unwrap();
        assert!(listed.contains("standup"));
    }

    #[tokio::test]
    async fn bad_timestamp_is_a_readable_result_not_an_error() {
        let store = test_store().await;
        let create = CreateAlarmTool::new(store, "bob", "console");

        let result = create
            .execute(serde_json::json!({
                "trigger_time": "whenever",
                "description": "vague"
            }))
            .await
            .unwrap();
        assert!(result.contains("Failed to create alarm"));
    }

    #[tokio::test]
    async fn missing_required_field_is_an_argument_error() {
        let store = test_store().await;
        let create = CreateAlarmTool::new(store, "bob", "console");

        let err = create
            .execute(serde_json::json!({"description": "no time"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn list_is_empty_for_new_user() {
        let store = test_store().await;
        let list = ListAlarmsTool::new(store, "bob");
        let result = list.execute(serde_json::json!({})).await.unwrap();
        assert_eq!(result, "No alarms set.");
    }

    #[tokio::test]
    async fn update_missing_alarm_reports_not_found() {
        let store = test_store().await;
        let update = UpdateAlarmTool::new(store);
        let result = update
            .execute(serde_json::json!({"alarm_id": 99, "description": "new"}))
            .await
            .unwrap();
        assert_eq!(result, "Alarm 99 not found.");
    }

    #[tokio::test]
    async fn update_with_no_changes_is_rejected_gently() {
        let store = test_store().await;
        let update = UpdateAlarmTool::new(store);
        let result = update
            .execute(serde_json::json!({"alarm_id": 1}))
            .await
            .unwrap();
        assert!(result.contains("Nothing to update"));
    }

    #[tokio::test]
    async fn delete_roundtrip() {
        let store = test_store().await;
        let create = CreateAlarmTool::new(store.clone(), "bob", "console");
        let delete = DeleteAlarmTool::new(store.clone());

        create
            .execute(serde_json::json!({
                "trigger_time": "2036-05-11T12:00:00Z",
                "description": "short-lived"
            }))
            .await
            .unwrap();

        let result = delete
            .execute(serde_json::json!({"alarm_id": 1}))
            .await
            .unwrap();
        assert_eq!(result, "Alarm 1 deleted.");

        let again = delete
            .execute(serde_json::json!({"alarm_id": 1}))
            .await
            .unwrap();
        assert_eq!(again, "Alarm 1 not found.");
    }
}
