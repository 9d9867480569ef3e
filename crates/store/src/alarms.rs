//! SQLite alarm store.
//!
//! Implements the `AlarmStore` contract for the tool surface, plus a
//! transactional sweep API used by the scheduler: one `AlarmSweep` wraps one
//! check pass, so every read and delete of a pass commits atomically (or not
//! at all).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::debug;

use bruin_core::alarm::{Alarm, AlarmStore};
use bruin_core::error::StoreError;

use crate::{decode_ts, encode_ts};

/// SQLite-backed alarm storage.
pub struct SqliteAlarmStore {
    pool: SqlitePool,
}

impl SqliteAlarmStore {
    /// Create the store and run migrations.
    pub async fn new(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS alarms (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                trigger_time TEXT NOT NULL,
                description  TEXT NOT NULL,
                user_id      TEXT NOT NULL,
                channel_id   TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("alarms table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_alarms_trigger_time ON alarms(trigger_time)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("trigger_time index: {e}")))?;

        debug!("alarm migrations complete");
        Ok(())
    }

    fn row_to_alarm(row: &sqlx::sqlite::SqliteRow) -> Result<Alarm, StoreError> {
        let trigger_raw: String = row
            .try_get("trigger_time")
            .map_err(|e| StoreError::QueryFailed(format!("trigger_time column: {e}")))?;
        Ok(Alarm {
            id: row
                .try_get("id")
                .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?,
            trigger_time: decode_ts(&trigger_raw)?,
            description: row
                .try_get("description")
                .map_err(|e| StoreError::QueryFailed(format!("description column: {e}")))?,
            user_id: row
                .try_get("user_id")
                .map_err(|e| StoreError::QueryFailed(format!("user_id column: {e}")))?,
            channel_id: row
                .try_get("channel_id")
                .map_err(|e| StoreError::QueryFailed(format!("channel_id column: {e}")))?,
        })
    }

    /// Begin a sweep transaction for one scheduler check pass.
    ///
    /// All reads and deletes through the returned `AlarmSweep` become visible
    /// only on `commit`. Dropping the sweep rolls everything back, so an
    /// abandoned pass leaves the table untouched.
    pub async fn begin_sweep(&self) -> Result<AlarmSweep, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("begin sweep: {e}")))?;
        Ok(AlarmSweep { tx })
    }
}

#[async_trait]
impl AlarmStore for SqliteAlarmStore {
    async fn create(
        &self,
        trigger_time: DateTime<Utc>,
        description: &str,
        user_id: &str,
        channel_id: &str,
    ) -> Result<i64, StoreError> {
        let result = sqlx::query(
            "INSERT INTO alarms (trigger_time, description, user_id, channel_id) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(encode_ts(trigger_time))
        .bind(description)
        .bind(user_id)
        .bind(channel_id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("insert alarm: {e}")))?;

        Ok(result.last_insert_rowid())
    }

    async fn get(&self, id: i64) -> Result<Option<Alarm>, StoreError> {
        let row = sqlx::query(
            "SELECT id, trigger_time, description, user_id, channel_id \
             FROM alarms WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("get alarm: {e}")))?;

        row.as_ref().map(Self::row_to_alarm).transpose()
    }

    async fn list(&self, user_id: &str, include_past: bool) -> Result<Vec<Alarm>, StoreError> {
        let rows = if include_past {
            sqlx::query(
                "SELECT id, trigger_time, description, user_id, channel_id \
                 FROM alarms WHERE user_id = ? ORDER BY trigger_time ASC",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query(
                "SELECT id, trigger_time, description, user_id, channel_id \
                 FROM alarms WHERE user_id = ? AND trigger_time > ? \
                 ORDER BY trigger_time ASC",
            )
            .bind(user_id)
            .bind(encode_ts(Utc::now()))
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| StoreError::QueryFailed(format!("list alarms: {e}")))?;

        rows.iter().map(Self::row_to_alarm).collect()
    }

    async fn update(
        &self,
        id: i64,
        trigger_time: Option<DateTime<Utc>>,
        description: Option<&str>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE alarms SET \
                 trigger_time = COALESCE(?, trigger_time), \
                 description  = COALESCE(?, description) \
             WHERE id = ?",
        )
        .bind(trigger_time.map(encode_ts))
        .bind(description)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("update alarm: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM alarms WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("delete alarm: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn query_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Alarm>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, trigger_time, description, user_id, channel_id \
             FROM alarms WHERE trigger_time > ? AND trigger_time <= ? \
             ORDER BY trigger_time ASC",
        )
        .bind(encode_ts(from))
        .bind(encode_ts(to))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("query alarm range: {e}")))?;

        rows.iter().map(Self::row_to_alarm).collect()
    }
}

/// One scheduler check pass over the alarms table, inside a transaction.
pub struct AlarmSweep {
    tx: Transaction<'static, Sqlite>,
}

impl AlarmSweep {
    /// Alarms strictly older than `cutoff` (stale, missed by more than one
    /// full interval).
    pub async fn stale(&mut self, cutoff: DateTime<Utc>) -> Result<Vec<Alarm>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, trigger_time, description, user_id, channel_id \
             FROM alarms WHERE trigger_time < ? ORDER BY trigger_time ASC",
        )
        .bind(encode_ts(cutoff))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("stale alarms: {e}")))?;

        rows.iter().map(SqliteAlarmStore::row_to_alarm).collect()
    }

    /// Alarms due in the fire window `from < trigger_time <= to`, ascending.
    pub async fn due(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Alarm>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, trigger_time, description, user_id, channel_id \
             FROM alarms WHERE trigger_time > ? AND trigger_time <= ? \
             ORDER BY trigger_time ASC",
        )
        .bind(encode_ts(from))
        .bind(encode_ts(to))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("due alarms: {e}")))?;

        rows.iter().map(SqliteAlarmStore::row_to_alarm).collect()
    }

    /// Delete one alarm within the sweep transaction.
    pub async fn remove(&mut self, id: i64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM alarms WHERE id = ?")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("remove alarm {id}: {e}")))?;
        Ok(())
    }

    /// Commit the pass. Without this, every read and delete rolls back.
    pub async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| StoreError::Storage(format!("commit sweep: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn test_store() -> SqliteAlarmStore {
        let pool = crate::connect("sqlite::memory:").await.unwrap();
        SqliteAlarmStore::new(pool).await.unwrap()
    }

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[tokio::test]
    async fn create_and_get() {
        let store = test_store().await;
        let t = at("2026-05-11T12:00:00Z");
        let id = store.create(t, "birthday", "bob", "console").await.unwrap();

        let alarm = store.get(id).await.unwrap().unwrap();
        assert_eq!(alarm.description, "birthday");
        assert_eq!(alarm.trigger_time, t);
        assert_eq!(alarm.user_id, "bob");
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let store = test_store().await;
        assert!(store.get(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_excludes_past_by_default() {
        let store = test_store().await;
        let past = Utc::now() - Duration::hours(1);
        let future = Utc::now() + Duration::hours(1);
        store.create(past, "old", "bob", "console").await.unwrap();
        store
            .create(future, "upcoming", "bob", "console")
            .await
            .unwrap();

        let upcoming = store.list("bob", false).await.unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].description, "upcoming");

        let all = store.list("bob", true).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn list_is_scoped_to_user() {
        let store = test_store().await;
        let future = Utc::now() + Duration::hours(1);
        store.create(future, "mine", "bob", "console").await.unwrap();
        store
            .create(future, "theirs", "alice", "console")
            .await
            .unwrap();

        let mine = store.list("bob", false).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].description, "mine");
    }

    #[tokio::test]
    async fn update_partial_fields() {
        let store = test_store().await;
        let t = at("2026-05-11T12:00:00Z");
        let id = store.create(t, "before", "bob", "console").await.unwrap();

        // Description only; trigger time untouched
        let changed = store.update(id, None, Some("after")).await.unwrap();
        assert!(changed);
        let alarm = store.get(id).await.unwrap().unwrap();
        assert_eq!(alarm.description, "after");
        assert_eq!(alarm.trigger_time, t);

        // Time only
        let t2 = at("2026-05-12T12:00:00Z");
        store.update(id, Some(t2), None).await.unwrap();
        let alarm = store.get(id).await.unwrap().unwrap();
        assert_eq!(alarm.trigger_time, t2);
        assert_eq!(alarm.description, "after");
    }

    #[tokio::test]
    async fn update_missing_returns_false() {
        let store = test_store().await;
        assert!(!store.update(999, None, Some("x")).await.unwrap());
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let store = test_store().await;
        let id = store
            .create(Utc::now(), "gone soon", "bob", "console")
            .await
            .unwrap();
        assert!(store.delete(id).await.unwrap());
        assert!(!store.delete(id).await.unwrap());
    }

    #[tokio::test]
    async fn query_range_bounds_are_exclusive_inclusive() {
        let store = test_store().await;
        let from = at("2026-05-11T12:00:00Z");
        let to = at("2026-05-11T12:01:00Z");

        store.create(from, "at from", "bob", "console").await.unwrap();
        store
            .create(at("2026-05-11T12:00:30Z"), "inside", "bob", "console")
            .await
            .unwrap();
        store.create(to, "at to", "bob", "console").await.unwrap();
        store
            .create(at("2026-05-11T12:01:01Z"), "after", "bob", "console")
            .await
            .unwrap();

        let hits = store.query_range(from, to).await.unwrap();
        let names: Vec<_> = hits.iter().map(|a| a.description.as_str()).collect();
        // from is excluded, to is included
        assert_eq!(names, vec!["inside", "at to"]);
    }

    #[tokio::test]
    async fn sweep_commit_makes_deletes_visible() {
        let store = test_store().await;
        let t = at("2026-05-11T12:00:00Z");
        let id = store.create(t, "fires", "bob", "console").await.unwrap();

        let mut sweep = store.begin_sweep().await.unwrap();
        let due = sweep
            .due(at("2026-05-11T11:59:00Z"), at("2026-05-11T12:00:05Z"))
            .await
            .unwrap();
        assert_eq!(due.len(), 1);
        sweep.remove(id).await.unwrap();
        sweep.commit().await.unwrap();

        assert!(store.get(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sweep_drop_rolls_back() {
        let store = test_store().await;
        let t = at("2026-05-11T12:00:00Z");
        let id = store.create(t, "survives", "bob", "console").await.unwrap();

        {
            let mut sweep = store.begin_sweep().await.unwrap();
            sweep.remove(id).await.unwrap();
            // dropped without commit
        }

        assert!(store.get(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn sweep_stale_is_strictly_older_than_cutoff() {
        let store = test_store().await;
        let cutoff = at("2026-05-11T12:00:00Z");

        store
            .create(at("2026-05-11T11:59:59Z"), "stale", "bob", "console")
            .await
            .unwrap();
        store
            .create(cutoff, "at cutoff", "bob", "console")
            .await
            .unwrap();

        let mut sweep = store.begin_sweep().await.unwrap();
        let stale = sweep.stale(cutoff).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].description, "stale");
    }
}
