//! SQLite user-context store.
//!
//! Each user row carries identity plus the persisted chat history as a JSON
//! array. An append upserts the context row and read-modify-writes the
//! history inside one transaction, applying the FIFO cap — so a new user's
//! row and their first messages become visible together, or not at all.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use bruin_core::context::{ContextStore, UserContext};
use bruin_core::error::StoreError;
use bruin_core::message::TimestampedMessage;

/// SQLite-backed user context storage.
pub struct SqliteContextStore {
    pool: SqlitePool,
    history_limit: usize,
}

impl SqliteContextStore {
    /// Create the store and run migrations.
    pub async fn new(pool: SqlitePool, history_limit: usize) -> Result<Self, StoreError> {
        let store = Self {
            pool,
            history_limit,
        };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_contexts (
                user_id   TEXT PRIMARY KEY,
                user_name TEXT NOT NULL,
                history   TEXT NOT NULL DEFAULT '[]'
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("user_contexts table: {e}")))?;

        debug!("user context migrations complete");
        Ok(())
    }

    fn decode_history(raw: &str) -> Result<Vec<TimestampedMessage>, StoreError> {
        serde_json::from_str(raw)
            .map_err(|e| StoreError::MalformedRow(format!("history column: {e}")))
    }
}

#[async_trait]
impl ContextStore for SqliteContextStore {
    async fn resolve(&self, user_id: &str) -> Result<Option<UserContext>, StoreError> {
        let row = sqlx::query("SELECT user_id, user_name, history FROM user_contexts WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("resolve context: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let history_raw: String = row
            .try_get("history")
            .map_err(|e| StoreError::QueryFailed(format!("history column: {e}")))?;

        Ok(Some(UserContext {
            user_id: row
                .try_get("user_id")
                .map_err(|e| StoreError::QueryFailed(format!("user_id column: {e}")))?,
            user_name: row
                .try_get("user_name")
                .map_err(|e| StoreError::QueryFailed(format!("user_name column: {e}")))?,
            history: Self::decode_history(&history_raw)?,
        }))
    }

    async fn append(
        &self,
        user_id: &str,
        user_name: &str,
        messages: &[TimestampedMessage],
    ) -> Result<(), StoreError> {
        if messages.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("begin append: {e}")))?;

        sqlx::query(
            "INSERT INTO user_contexts (user_id, user_name, history) VALUES (?, ?, '[]') \
             ON CONFLICT(user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(user_name)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("upsert context: {e}")))?;

        let row = sqlx::query("SELECT history FROM user_contexts WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("read history: {e}")))?;

        let history_raw: String = row
            .try_get("history")
            .map_err(|e| StoreError::QueryFailed(format!("history column: {e}")))?;
        let mut history = Self::decode_history(&history_raw)?;

        history.extend_from_slice(messages);
        if history.len() > self.history_limit {
            let excess = history.len() - self.history_limit;
            history.drain(..excess);
        }

        let encoded = serde_json::to_string(&history)
            .map_err(|e| StoreError::Storage(format!("encode history: {e}")))?;

        sqlx::query("UPDATE user_contexts SET history = ? WHERE user_id = ?")
            .bind(encoded)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("write history: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("commit append: {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store(limit: usize) -> SqliteContextStore {
        let pool = crate::connect("sqlite::memory:").await.unwrap();
        SqliteContextStore::new(pool, limit).await.unwrap()
    }

    #[tokio::test]
    async fn resolve_unknown_user_is_none() {
        let store = test_store(16).await;
        assert!(store.resolve("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn append_creates_the_context_for_a_new_user() {
        let store = test_store(16).await;
        store
            .append("u1", "Ursula", &[TimestampedMessage::user("hello")])
            .await
            .unwrap();

        let ctx = store.resolve("u1").await.unwrap().unwrap();
        assert_eq!(ctx.user_name, "Ursula");
        assert_eq!(ctx.history.len(), 1);
    }

    #[tokio::test]
    async fn empty_append_leaves_no_row_behind() {
        let store = test_store(16).await;
        store.append("u1", "Ursula", &[]).await.unwrap();
        assert!(store.resolve("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn append_persists_messages_in_order() {
        let store = test_store(16).await;
        store
            .append(
                "u1",
                "Ursula",
                &[
                    TimestampedMessage::user("hello"),
                    TimestampedMessage::ai("hi there"),
                ],
            )
            .await
            .unwrap();

        let ctx = store.resolve("u1").await.unwrap().unwrap();
        assert_eq!(ctx.history.len(), 2);
        assert_eq!(ctx.history[0].content, "hello");
        assert_eq!(ctx.history[1].content, "hi there");
    }

    #[tokio::test]
    async fn append_applies_fifo_cap() {
        let store = test_store(3).await;
        for i in 0..5 {
            store
                .append("u1", "Ursula", &[TimestampedMessage::user(format!("m{i}"))])
                .await
                .unwrap();
        }

        let ctx = store.resolve("u1").await.unwrap().unwrap();
        assert_eq!(ctx.history.len(), 3);
        assert_eq!(ctx.history[0].content, "m2");
        assert_eq!(ctx.history[2].content, "m4");
    }

    #[tokio::test]
    async fn first_seen_user_name_sticks() {
        let store = test_store(16).await;
        store
            .append("u1", "Ursula", &[TimestampedMessage::user("one")])
            .await
            .unwrap();
        store
            .append("u1", "Somebody Else", &[TimestampedMessage::user("two")])
            .await
            .unwrap();

        let ctx = store.resolve("u1").await.unwrap().unwrap();
        assert_eq!(ctx.user_name, "Ursula");
        assert_eq!(ctx.history.len(), 2);
    }

    #[tokio::test]
    async fn message_ids_survive_persistence() {
        let store = test_store(16).await;
        let msg = TimestampedMessage::user("keyed");
        let id = msg.id.clone();
        store.append("u1", "Ursula", &[msg]).await.unwrap();

        let ctx = store.resolve("u1").await.unwrap().unwrap();
        assert_eq!(ctx.history[0].id, id);
    }
}
