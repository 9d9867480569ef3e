//! Alarm domain type and the durable store contract.
//!
//! An alarm is a persisted `(time, description, owner, channel)` tuple that
//! fires exactly one system event when due. Alarms are created through the
//! tool surface and read, matched, and deleted exclusively by the scheduler
//! once fired or stale.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A persisted alarm.
///
/// `trigger_time` is always normalized to UTC before storage; no naive or
/// ambiguous timestamps persist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alarm {
    /// Row id, assigned by the store
    pub id: i64,

    /// The absolute UTC instant at which the alarm fires
    pub trigger_time: DateTime<Utc>,

    /// What the alarm is for and what should happen when it fires
    pub description: String,

    /// The user who created this alarm
    pub user_id: String,

    /// The channel the alarm was created from
    pub channel_id: String,
}

impl std::fmt::Display for Alarm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Alarm {}: {} (triggers at {})",
            self.id,
            self.description,
            self.trigger_time.to_rfc3339()
        )
    }
}

/// The durable alarm store contract.
///
/// Implemented by `bruin-store`'s SQLite backend. The scheduler additionally
/// uses the backend's transactional sweep API, which is a concrete extension
/// of this contract (one transaction per check pass).
#[async_trait]
pub trait AlarmStore: Send + Sync {
    /// Create an alarm, returning its assigned id.
    async fn create(
        &self,
        trigger_time: DateTime<Utc>,
        description: &str,
        user_id: &str,
        channel_id: &str,
    ) -> std::result::Result<i64, StoreError>;

    /// Fetch a single alarm by id.
    async fn get(&self, id: i64) -> std::result::Result<Option<Alarm>, StoreError>;

    /// List a user's alarms ordered by `trigger_time` ascending.
    ///
    /// Past alarms are excluded unless `include_past` is set.
    async fn list(
        &self,
        user_id: &str,
        include_past: bool,
    ) -> std::result::Result<Vec<Alarm>, StoreError>;

    /// Update an alarm's trigger time and/or description.
    ///
    /// Returns `false` if no alarm with that id exists.
    async fn update(
        &self,
        id: i64,
        trigger_time: Option<DateTime<Utc>>,
        description: Option<&str>,
    ) -> std::result::Result<bool, StoreError>;

    /// Delete an alarm. Returns `false` if no alarm with that id exists.
    async fn delete(&self, id: i64) -> std::result::Result<bool, StoreError>;

    /// Query alarms with `from < trigger_time <= to`, ordered by
    /// `trigger_time` ascending. These are exactly the fire-window bounds
    /// the scheduler uses.
    async fn query_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> std::result::Result<Vec<Alarm>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alarm_display_includes_id_and_time() {
        let alarm = Alarm {
            id: 7,
            trigger_time: chrono::DateTime::parse_from_rfc3339("2026-05-11T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            description: "Bob's birthday".into(),
            user_id: "bob".into(),
            channel_id: "console".into(),
        };
        let s = alarm.to_string();
        assert!(s.contains("Alarm 7"));
        assert!(s.contains("Bob's birthday"));
        assert!(s.contains("2026-05-11T12:00:00"));
    }
}
